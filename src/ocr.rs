//! Hand decoded subtitles to an OCR engine.
//!
//! The engine itself is supplied by the caller through the [`OcrEngine`]
//! trait. Engines are usually costly to create, so an [`EngineCache`]
//! keeps one per language until it is [released](EngineCache::release).

use compact_str::CompactString;
use image::GrayImage;
use log::{debug, trace, warn};
use std::{
    borrow::Borrow,
    collections::{hash_map::Entry, HashMap},
    fmt,
};
use thiserror::Error;

use crate::{
    image::{binarize, BinarizeOptions},
    time::TimeSpan,
    vobsub::DecodedCue,
};

/// Errors reported by OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine for a language couldn't be created.
    #[error("Could not create OCR engine for '{lang}': {reason}")]
    Init {
        /// Requested language.
        lang: CompactString,
        /// Engine specific reason.
        reason: String,
    },

    /// An image couldn't be recognized.
    #[error("Text recognition failed: {0}")]
    Recognition(String),
}

/// A text recognition engine.
pub trait OcrEngine {
    /// Recognize the text of a black on white image.
    ///
    /// # Errors
    /// Return an [`OcrError::Recognition`] if the engine fails.
    fn recognize(&mut self, image: &GrayImage) -> Result<String, OcrError>;
}

/// Build an [`OcrEngine`] for a language key (`eng`, `fra`, ...).
pub trait EngineFactory {
    /// Create an engine.
    ///
    /// # Errors
    /// Return an [`OcrError::Init`] if the engine can't be created.
    fn create(&self, lang: &str) -> Result<Box<dyn OcrEngine>, OcrError>;
}

impl<F> EngineFactory for F
where
    F: Fn(&str) -> Result<Box<dyn OcrEngine>, OcrError>,
{
    fn create(&self, lang: &str) -> Result<Box<dyn OcrEngine>, OcrError> {
        self(lang)
    }
}

/// Engines created on demand, one per language.
pub struct EngineCache<F> {
    factory: F,
    engines: HashMap<CompactString, Box<dyn OcrEngine>>,
}

impl<F: EngineFactory> EngineCache<F> {
    /// An empty cache using `factory` to build engines.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            engines: HashMap::new(),
        }
    }

    /// The engine for `lang`, created on first use.
    ///
    /// # Errors
    /// Forward the factory error if the engine has to be created and can't.
    pub fn acquire(&mut self, lang: &str) -> Result<&mut dyn OcrEngine, OcrError> {
        match self.engines.entry(CompactString::from(lang)) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_mut()),
            Entry::Vacant(entry) => {
                debug!("Creating OCR engine for '{lang}'");
                let engine = self.factory.create(lang)?;
                Ok(entry.insert(engine).as_mut())
            }
        }
    }

    /// Drop all engines.
    pub fn release(&mut self) {
        debug!("Releasing {} OCR engine(s)", self.engines.len());
        self.engines.clear();
    }

    /// Number of live engines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Is there no live engine?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

/// How many cues the engine recognized.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OcrReport {
    /// Cues with a text.
    pub recognized: usize,
    /// Cues the engine failed on. They are kept with an empty text.
    pub failed: usize,
}

impl fmt::Display for OcrReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} subtitles recognized, {} failed",
            self.recognized, self.failed
        )
    }
}

/// Recognize the text of each cue, in order.
///
/// Every cue keeps its time slot: when the engine fails, the text is empty
/// and the failure is counted in the report.
#[profiling::function]
pub fn recognize_cues<I>(
    cues: I,
    engine: &mut dyn OcrEngine,
    options: BinarizeOptions,
) -> (Vec<(TimeSpan, String)>, OcrReport)
where
    I: IntoIterator,
    I::Item: Borrow<DecodedCue>,
{
    let mut report = OcrReport::default();
    let texts = cues
        .into_iter()
        .map(|cue| {
            let cue = cue.borrow();
            let image = binarize(&cue.image, options);
            let text = match engine.recognize(&image) {
                Ok(text) => {
                    report.recognized += 1;
                    trace!("Subtitle #{} recognized as {text:?}", cue.index);
                    text.trim().to_owned()
                }
                Err(err) => {
                    report.failed += 1;
                    warn!("OCR of subtitle #{} failed: {err}", cue.index);
                    String::new()
                }
            };
            (cue.time_span(), text)
        })
        .collect();
    (texts, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content::{Area, Size},
        time::TimePoint,
    };
    use image::{Rgba, RgbaImage};
    use std::{cell::Cell, rc::Rc};

    /// Count black pixels, fail on images without any.
    struct PixelCounter;

    impl OcrEngine for PixelCounter {
        fn recognize(&mut self, image: &GrayImage) -> Result<String, OcrError> {
            let black = image.pixels().filter(|px| px[0] == 0).count();
            if black == 0 {
                Err(OcrError::Recognition("blank image".into()))
            } else {
                Ok(format!(" {black} \n"))
            }
        }
    }

    fn cue(index: usize, text_pixels: u32) -> DecodedCue {
        let mut image = RgbaImage::new(4, 2);
        for x in 0..text_pixels {
            image.put_pixel(x, 0, Rgba([0xff, 0xff, 0xff, 0xff]));
        }
        let start = TimePoint::from_msecs(1000 * i64::try_from(index).unwrap());
        DecodedCue {
            index,
            start,
            end: start + TimePoint::from_msecs(500),
            area: Area::from_size(Size { w: 4, h: 2 }).unwrap(),
            force: false,
            partial: false,
            image,
        }
    }

    #[test]
    fn failed_cues_keep_their_slot() {
        let cues = vec![cue(0, 3), cue(1, 0), cue(2, 1)];
        let (texts, report) = recognize_cues(&cues, &mut PixelCounter, BinarizeOptions::default());
        assert_eq!(
            report,
            OcrReport {
                recognized: 2,
                failed: 1
            }
        );
        let texts: Vec<_> = texts.iter().map(|(_, text)| text.as_str()).collect();
        assert_eq!(texts, ["3", "", "1"]);
        assert_eq!(report.to_string(), "2 subtitles recognized, 1 failed");
    }

    #[test]
    fn cache_creates_engines_once() {
        let created = Rc::new(Cell::new(0));
        let counter = Rc::clone(&created);
        let mut cache = EngineCache::new(move |lang: &str| -> Result<Box<dyn OcrEngine>, OcrError> {
            if lang == "xx" {
                return Err(OcrError::Init {
                    lang: lang.into(),
                    reason: "no such language".into(),
                });
            }
            counter.set(counter.get() + 1);
            Ok(Box::new(PixelCounter))
        });

        let image = GrayImage::from_pixel(2, 2, image::Luma([0]));
        assert_eq!(cache.acquire("eng").unwrap().recognize(&image).unwrap(), " 4 \n");
        cache.acquire("eng").unwrap();
        cache.acquire("fra").unwrap();
        assert!(matches!(cache.acquire("xx"), Err(OcrError::Init { .. })));
        assert_eq!(created.get(), 2);
        assert_eq!(cache.len(), 2);

        cache.release();
        assert!(cache.is_empty());
        cache.acquire("eng").unwrap();
        assert_eq!(created.get(), 3);
    }
}
