use super::*;
use crate::{
    cache::CacheStore,
    cache_key::CacheKey,
    descriptor::{OperationKind, ProblemDescriptor},
    job,
};

struct Fixture {
    _dir: tempfile::TempDir,
    process_root: PathBuf,
    locator: ArtifactLocator,
    job: RenderJob,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let process_root = dir.path().to_path_buf();
    let cache_root = process_root.join("public").join("manim-cache");
    let cache = CacheStore::new(&cache_root, "math_viz", "/manim-cache");
    let d = ProblemDescriptor::new(OperationKind::Subtraction, 9, 4, 5);
    let job = job::configure(&d, &CacheKey::derive(&d), &cache).unwrap();
    Fixture {
        _dir: dir,
        locator: ArtifactLocator::new(&process_root, &cache_root),
        process_root,
        job,
    }
}

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"video").unwrap();
}

#[test]
fn finds_complete_video_in_working_dir() {
    let fx = fixture();
    let video = fx.job.working_dir.join("videos/scene/720p30/out.mp4");
    touch(&video);

    assert_eq!(fx.locator.locate(&fx.job), Some(video));
}

#[test]
fn partial_segments_are_skipped_when_a_complete_video_exists() {
    let fx = fixture();
    let partial = fx
        .job
        .working_dir
        .join("videos/scene/720p30/partial_movie_files/Scene/0001.mp4");
    let complete = fx.job.working_dir.join("videos/scene/720p30/zz_final.mp4");
    touch(&partial);
    touch(&complete);

    assert_eq!(
        fx.locator.search(&fx.job, SearchLayer::WorkingDirComplete),
        Some(complete.clone())
    );
    assert_eq!(fx.locator.locate(&fx.job), Some(complete));
}

#[test]
fn falls_back_to_partial_segments() {
    let fx = fixture();
    let partial = fx
        .job
        .working_dir
        .join("videos/scene/720p30/partial_movie_files/Scene/0001.mp4");
    touch(&partial);

    assert!(
        fx.locator
            .search(&fx.job, SearchLayer::WorkingDirComplete)
            .is_none()
    );
    assert_eq!(fx.locator.locate(&fx.job), Some(partial));
}

#[test]
fn non_video_files_are_ignored() {
    let fx = fixture();
    touch(&fx.job.working_dir.join("texts/label.svg"));
    touch(&fx.job.working_dir.join("videos/out.mp4.log"));

    assert!(fx.locator.locate(&fx.job).is_none());
}

#[test]
fn first_match_in_sorted_walk_order_wins() {
    let fx = fixture();
    let first = fx.job.working_dir.join("a/clip.mp4");
    touch(&first);
    touch(&fx.job.working_dir.join("b/clip.mp4"));

    assert_eq!(fx.locator.locate(&fx.job), Some(first));
}

#[test]
fn falls_back_to_process_root_for_named_output() {
    let fx = fixture();
    let stray = fx
        .process_root
        .join("media/videos/720p30")
        .join(format!("{}.mp4", fx.job.output_base_name));
    touch(&stray);
    touch(&fx.process_root.join("media/videos/unrelated.mp4"));

    let found = fx.locator.locate(&fx.job).unwrap();
    assert_eq!(found.file_name(), stray.file_name());
    assert_eq!(
        std::fs::canonicalize(found).unwrap(),
        std::fs::canonicalize(stray).unwrap()
    );
}

#[test]
fn process_root_search_never_returns_files_inside_the_cache() {
    let fx = fixture();
    let cache_root = fx.job.working_dir.parent().unwrap().to_path_buf();
    touch(&cache_root.join(format!("{}.mp4", fx.job.output_base_name)));
    touch(&cache_root.join("other").join(format!("{}.mp4", fx.job.output_base_name)));

    assert!(fx.locator.search(&fx.job, SearchLayer::ProcessRoot).is_none());
    assert!(fx.locator.locate(&fx.job).is_none());
}
