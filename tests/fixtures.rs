use std::{env, fs, process};

use subtext::{
    image::{dump_cues, ImageSize as _},
    ocr::{recognize_cues, OcrEngine, OcrError},
    srt,
    time::TimePoint,
    vobsub::{is_idx_file, is_sub_file, VobSub, VobSubError},
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn every_fixture_decodes_cleanly() {
    init_logs();
    let mut count = 0;
    for path in glob::glob("fixtures/*.idx").unwrap() {
        let path = path.unwrap();
        assert!(is_idx_file(&path).unwrap(), "{}", path.display());
        assert!(is_sub_file(path.with_extension("sub")).unwrap());

        let vobsub = VobSub::open(&path).unwrap();
        let (cues, report) = vobsub.decode_all();
        assert_eq!(report.skipped, 0, "{}: {report}", path.display());
        assert_eq!(report.partial, 0, "{}: {report}", path.display());
        assert_eq!(cues.len(), vobsub.index().entries().len());
        for cue in &cues {
            assert!(cue.start < cue.end);
            assert_eq!(cue.image.dimensions(), (cue.width(), cue.height()));
        }
        count += 1;
    }
    assert!(count >= 2);
}

#[test]
fn example_fixture() {
    init_logs();
    let vobsub = VobSub::open("fixtures/example.idx").unwrap();
    let index = vobsub.index();
    assert_eq!(index.lang().map(|lang| lang.lang()), Some("en"));
    assert_eq!((index.size().w, index.size().h), (720, 480));

    let cues: Vec<_> = vobsub.cues().collect::<Result<_, _>>().unwrap();
    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].start, TimePoint::from_msecs(49_400));
    assert_eq!(cues[0].end, TimePoint::from_msecs(52_000));
    assert_eq!(cues[1].end, TimePoint::from_msecs(55_000));
    assert_eq!((cues[0].area.left(), cues[0].area.top()), (100, 400));
    assert_eq!((cues[0].width(), cues[0].height()), (16, 4));
    assert_eq!((cues[1].width(), cues[1].height()), (16, 2));
    assert!(!cues[0].force);

    // Background of the first line is transparent, its middle is opaque.
    assert_eq!(cues[0].image.get_pixel(0, 0)[3], 0);
    assert_eq!(cues[0].image.get_pixel(8, 0)[3], 0xff);
}

#[test]
fn split_packet_fixture() {
    let vobsub = VobSub::open("fixtures/tiny-split.idx").unwrap();
    let cue = vobsub.decode(0).unwrap().unwrap();
    assert_eq!((cue.area.left(), cue.area.top()), (10, 20));
    assert_eq!((cue.width(), cue.height()), (16, 4));
    assert!(!cue.partial);
}

#[test]
fn open_checks_file_shapes() {
    let res = VobSub::open("fixtures/example.sub");
    assert!(matches!(res, Err(VobSubError::NotAnIndexFile(_))));

    let dir = env::temp_dir().join(format!("subtext-lonely-{}", process::id()));
    fs::create_dir_all(&dir).unwrap();
    let lonely = dir.join("lonely.idx");
    fs::copy("fixtures/example.idx", &lonely).unwrap();
    assert!(matches!(VobSub::open(&lonely), Err(VobSubError::Io { .. })));
}

/// Recognizes every image as its black pixel count.
struct Counter;

impl OcrEngine for Counter {
    fn recognize(&mut self, image: &image::GrayImage) -> Result<String, OcrError> {
        Ok(image.pixels().filter(|px| px[0] == 0).count().to_string())
    }
}

#[test]
fn fixture_to_srt() {
    init_logs();
    let vobsub = VobSub::open("fixtures/example.idx").unwrap();
    let (cues, _) = vobsub.decode_all();
    let (texts, report) = recognize_cues(&cues, &mut Counter, Default::default());
    assert_eq!(report.failed, 0);

    let mut out = Vec::new();
    srt::write_srt(&texts, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("1\n00:00:49,400 --> 00:00:52,000\n"));
    assert!(out.contains("\n\n2\n00:00:52,000 --> 00:00:55,000\n"));

    let dir = env::temp_dir().join(format!("subtext-fixture-dump-{}", process::id()));
    dump_cues(&dir, &cues).unwrap();
    assert!(dir.join("000001.png").is_file());
}
