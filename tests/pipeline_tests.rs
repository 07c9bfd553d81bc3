//! End-to-end pipeline tests: completeness, fail-fast, cancellation, and thread shutdown.

use digestree::engine::tools::running_as_root;
use digestree::pipeline::{CancelToken, PipelineHandles, digest_item, join_stages, start_pipeline};
use digestree::{
    Digest, DigestOpts, Digests, PipelineError, Semaphore, SemaphoreError, digest_tree,
    process_tree,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Build a small nested tree; returns (tempdir, canonical root, abs path → contents).
fn fixture_tree() -> (tempfile::TempDir, PathBuf, HashMap<PathBuf, Vec<u8>>) {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let files: Vec<(&str, Vec<u8>)> = vec![
        ("a.txt", b"alpha".to_vec()),
        ("empty", Vec::new()),
        ("sub/b.txt", b"bravo".to_vec()),
        ("sub/deeper/c.bin", (0..=255u8).cycle().take(10_000).collect()),
        ("sub/deeper/d.txt", b"delta".to_vec()),
        ("other/e.txt", b"echo".to_vec()),
    ];
    fs::create_dir_all(root.join("empty_dir")).unwrap();
    let mut expected = HashMap::new();
    for (rel, data) in files {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, &data).unwrap();
        expected.insert(p, data);
    }
    (tmp, root, expected)
}

fn wide_tree(n: usize) -> (tempfile::TempDir, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    for i in 0..n {
        let dir = root.join(format!("d{}", i % 7));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("f{i}.txt")), format!("file number {i}")).unwrap();
    }
    (tmp, root)
}

#[cfg(unix)]
fn make_unreadable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
}

#[cfg(unix)]
fn make_readable(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

/// Run `f` on a thread and fail the test if it takes longer than `secs`.
fn within<T: Send + 'static>(secs: u64, f: impl FnOnce() -> T + Send + 'static) -> T {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(Duration::from_secs(secs))
        .expect("operation did not finish in time")
}

/// Aggregate like `digest_tree` does (fold under a drop guard), then require every
/// stage thread to exit within a few seconds of the aggregator returning.
fn collect_then_join<F>(handles: PipelineHandles, on_record: F) -> Result<Digests, PipelineError>
where
    F: FnMut(&Path, &Digest),
{
    let guard = handles.cancel.drop_guard();
    let result = handles.collect(false, on_record);
    drop(guard);
    let PipelineHandles {
        records,
        walk_handle,
        worker_handles,
        merge_handle,
        ..
    } = handles;
    drop(records);
    within(5, move || join_stages(walk_handle, worker_handles, merge_handle)).unwrap();
    result
}

// --- completeness ---

#[test]
fn test_process_tree_digests_every_regular_file() {
    let (_tmp, root, expected) = fixture_tree();
    let digests = process_tree(&root).unwrap();

    let keys: HashSet<_> = digests.keys().cloned().collect();
    let want: HashSet<_> = expected.keys().cloned().collect();
    assert_eq!(keys, want);
    for (path, data) in &expected {
        assert_eq!(digests[path], Digest::from(blake3::hash(data)), "{}", path.display());
    }
}

#[test]
fn test_relative_paths_keys() {
    let (_tmp, root, expected) = fixture_tree();
    let opts = DigestOpts {
        relative_paths: true,
        num_threads: Some(3),
        ..Default::default()
    };
    let digests = digest_tree(&root, &opts, None::<fn(&Path, &Digest)>).unwrap();
    let want: HashSet<_> = expected
        .keys()
        .map(|p| p.strip_prefix(&root).unwrap().to_path_buf())
        .collect();
    assert_eq!(digests.keys().cloned().collect::<HashSet<_>>(), want);
    assert_eq!(
        digests[Path::new("sub/b.txt")],
        Digest::from(blake3::hash(b"bravo"))
    );
}

#[test]
fn test_empty_root_yields_empty_map() {
    let tmp = tempfile::tempdir().unwrap();
    let digests = process_tree(tmp.path()).unwrap();
    assert!(digests.is_empty());
}

#[test]
fn test_single_worker_and_tiny_channels_still_complete() {
    let (_tmp, root) = wide_tree(200);
    let opts = DigestOpts {
        num_threads: Some(1),
        channel_cap: Some(1),
        ..Default::default()
    };
    let digests = digest_tree(&root, &opts, None::<fn(&Path, &Digest)>).unwrap();
    assert_eq!(digests.len(), 200);
}

#[test]
fn test_callback_sees_every_digest() {
    let (_tmp, root, expected) = fixture_tree();
    let mut seen = Vec::new();
    let digests = digest_tree(
        &root,
        &DigestOpts::default(),
        Some(|p: &Path, d: &Digest| seen.push((p.to_path_buf(), *d))),
    )
    .unwrap();
    assert_eq!(seen.len(), expected.len());
    for (p, d) in seen {
        assert_eq!(digests[&p], d);
    }
}

const CLUTTER: [&str; 7] = [
    ".DS_Store",
    "._notes",
    "Thumbs.db",
    ".directory",
    "Desktop.ini",
    "ehthumbs.db",
    ".digestree.toml",
];

#[test]
fn test_default_opts_keep_clutter_and_config_files() {
    let (_tmp, root, mut expected) = fixture_tree();
    for name in CLUTTER {
        let p = root.join(name);
        fs::write(&p, name.as_bytes()).unwrap();
        expected.insert(p, name.as_bytes().to_vec());
    }
    let digests = process_tree(&root).unwrap();
    let keys: HashSet<_> = digests.keys().cloned().collect();
    let want: HashSet<_> = expected.keys().cloned().collect();
    assert_eq!(keys, want);
    assert_eq!(
        digests[&root.join(".DS_Store")],
        Digest::from(blake3::hash(b".DS_Store"))
    );
}

#[test]
fn test_exclude_patterns_and_clutter_skipping() {
    let (_tmp, root, _) = fixture_tree();
    fs::write(root.join("noise.log"), b"x").unwrap();
    for name in CLUTTER {
        fs::write(root.join(name), b"x").unwrap();
    }
    let opts = DigestOpts {
        exclude: vec!["*.log".to_string(), "deeper".to_string()],
        skip_os_clutter: true,
        relative_paths: true,
        ..Default::default()
    };
    let digests = digest_tree(&root, &opts, None::<fn(&Path, &Digest)>).unwrap();
    assert!(!digests.contains_key(Path::new("noise.log")));
    for name in &CLUTTER[..6] {
        assert!(!digests.contains_key(Path::new(name)), "{name}");
    }
    // Clutter skipping leaves the config file alone; only an exclude pattern drops it.
    assert!(digests.contains_key(Path::new(".digestree.toml")));
    // Excluded directories are pruned with everything under them.
    assert!(!digests.contains_key(Path::new("sub/deeper/d.txt")));
    assert!(!digests.contains_key(Path::new("sub/deeper/c.bin")));
    assert!(digests.contains_key(Path::new("sub/b.txt")));
    assert!(digests.contains_key(Path::new("a.txt")));
}

#[cfg(unix)]
#[test]
fn test_symlinks_skipped_unless_followed() {
    let (_tmp, root, _) = fixture_tree();
    std::os::unix::fs::symlink(root.join("a.txt"), root.join("link.txt")).unwrap();

    let digests = process_tree(&root).unwrap();
    assert!(!digests.contains_key(&root.join("link.txt")));

    let opts = DigestOpts {
        follow_links: true,
        ..Default::default()
    };
    let followed = digest_tree(&root, &opts, None::<fn(&Path, &Digest)>).unwrap();
    assert_eq!(followed[&root.join("link.txt")], followed[&root.join("a.txt")]);
}

#[test]
fn test_admission_cap_smaller_than_pool_still_completes() {
    let (_tmp, root) = wide_tree(120);
    let opts = DigestOpts {
        num_threads: Some(8),
        max_open_files: Some(1),
        permit_timeout: Some(Duration::from_secs(10)),
        ..Default::default()
    };
    let digests = digest_tree(&root, &opts, None::<fn(&Path, &Digest)>).unwrap();
    assert_eq!(digests.len(), 120);
}

// --- failures ---

#[test]
fn test_missing_root_is_traversal_error() {
    let tmp = tempfile::tempdir().unwrap();
    let err = process_tree(&tmp.path().join("does-not-exist")).unwrap_err();
    assert!(matches!(err, PipelineError::Traversal { .. }), "{err}");
}

#[cfg(unix)]
#[test]
fn test_unreadable_root_is_traversal_error() {
    if running_as_root() {
        return;
    }
    let (_tmp, root, _) = fixture_tree();
    make_unreadable(&root);
    let r = root.clone();
    let result = within(10, move || process_tree(&r));
    make_readable(&root, 0o755);
    assert!(matches!(result, Err(PipelineError::Traversal { .. })));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_fails_fast() {
    if running_as_root() {
        return;
    }
    let (_tmp, root) = wide_tree(500);
    let bad = root.join("d3").join("f3.txt");
    make_unreadable(&bad);
    let r = root.clone();
    let opts = DigestOpts {
        num_threads: Some(4),
        channel_cap: Some(2),
        ..Default::default()
    };
    let result = within(10, move || {
        digest_tree(&r, &opts, None::<fn(&Path, &Digest)>)
    });
    make_readable(&bad, 0o644);
    match result {
        Err(PipelineError::Item { path, .. }) => assert_eq!(path, bad),
        other => panic!("expected item error, got {:?}", other.map(|m| m.len())),
    }
}

#[cfg(unix)]
#[test]
fn test_racing_failures_report_one_error() {
    if running_as_root() {
        return;
    }
    let (_tmp, root) = wide_tree(300);
    let bad: Vec<_> = (0..20)
        .map(|i| root.join(format!("d{}", i % 7)).join(format!("f{i}.txt")))
        .collect();
    for p in &bad {
        make_unreadable(p);
    }
    let r = root.clone();
    let opts = DigestOpts {
        num_threads: Some(8),
        ..Default::default()
    };
    let result = within(10, move || {
        digest_tree(&r, &opts, None::<fn(&Path, &Digest)>)
    });
    for p in &bad {
        make_readable(p, 0o644);
    }
    match result {
        Err(PipelineError::Item { path, .. }) => assert!(bad.contains(&path)),
        other => panic!("expected item error, got {:?}", other.map(|m| m.len())),
    }
}

#[test]
fn test_digest_item_reports_admission_timeout() {
    let (_tmp, root, _) = fixture_tree();
    let sem = Semaphore::new(1, Duration::from_millis(50));
    sem.acquire().unwrap();
    let err = digest_item(&root.join("a.txt"), Some(&sem)).unwrap_err();
    match err {
        PipelineError::Admission { source, .. } => assert!(matches!(
            source,
            SemaphoreError::NoPermitsAvailable { .. }
        )),
        other => panic!("expected admission error, got {other}"),
    }
    // The failed item did not leak a permit.
    assert_eq!(sem.outstanding(), 1);
}

// --- cancellation ---

#[test]
fn test_pre_cancelled_external_token_cancels_run() {
    let (_tmp, root) = wide_tree(50);
    let external = CancelToken::new();
    external.cancel();
    let opts = DigestOpts {
        cancel: Some(external),
        ..Default::default()
    };
    let result = within(10, move || {
        digest_tree(&root, &opts, None::<fn(&Path, &Digest)>)
    });
    assert!(matches!(result, Err(PipelineError::Canceled)));
}

#[test]
fn test_cancel_from_callback_stops_run() {
    let (_tmp, root) = wide_tree(400);
    let external = CancelToken::new();
    let trigger = external.clone();
    let opts = DigestOpts {
        cancel: Some(external),
        num_threads: Some(2),
        channel_cap: Some(1),
        ..Default::default()
    };
    let result = within(10, move || {
        let mut n = 0;
        digest_tree(
            &root,
            &opts,
            Some(|_: &Path, _: &Digest| {
                n += 1;
                if n == 5 {
                    trigger.cancel();
                    trigger.cancel();
                }
            }),
        )
    });
    assert!(matches!(result, Err(PipelineError::Canceled)));
}

#[test]
fn test_abandoned_pipeline_releases_every_thread() {
    let (_tmp, root) = wide_tree(300);
    let opts = DigestOpts {
        num_threads: Some(4),
        channel_cap: Some(1),
        ..Default::default()
    };
    let handles = start_pipeline(&root, &opts, CancelToken::new()).unwrap();
    assert_eq!(handles.worker_handles.len(), 4);
    // Take a single record, then walk away with every stage blocked on a full channel.
    assert!(handles.records.recv().unwrap().outcome.is_ok());
    within(10, move || handles.shutdown()).unwrap();
}

#[cfg(unix)]
#[test]
fn test_failed_run_leaves_no_stage_blocked() {
    if running_as_root() {
        return;
    }
    let (_tmp, root) = wide_tree(600);
    let bad = root.join("d0").join("f7.txt");
    make_unreadable(&bad);
    let opts = DigestOpts {
        num_threads: Some(4),
        channel_cap: Some(1),
        ..Default::default()
    };
    let handles = start_pipeline(&root, &opts, CancelToken::new()).unwrap();
    let result = collect_then_join(handles, |_, _| {});
    make_readable(&bad, 0o644);
    match result {
        Err(PipelineError::Item { path, .. }) => assert_eq!(path, bad),
        other => panic!("expected item error, got {:?}", other.map(|m| m.len())),
    }
}

#[test]
fn test_canceled_run_leaves_no_stage_blocked() {
    let (_tmp, root) = wide_tree(400);
    let opts = DigestOpts {
        num_threads: Some(3),
        channel_cap: Some(1),
        ..Default::default()
    };
    let handles = start_pipeline(&root, &opts, CancelToken::new()).unwrap();
    let trigger = handles.cancel.clone();
    let mut n = 0;
    let result = collect_then_join(handles, |_, _| {
        n += 1;
        if n == 3 {
            trigger.cancel();
        }
    });
    assert!(matches!(result, Err(PipelineError::Canceled)));
}

#[test]
fn test_external_token_reused_across_runs() {
    let (_tmp, root, expected) = fixture_tree();
    let external = CancelToken::new();
    let opts = DigestOpts {
        cancel: Some(external.clone()),
        ..Default::default()
    };
    for _ in 0..20 {
        let digests = digest_tree(&root, &opts, None::<fn(&Path, &Digest)>).unwrap();
        assert_eq!(digests.len(), expected.len());
    }
    // Each run cancels only its own child token.
    assert!(!external.is_cancelled());
}

#[test]
fn test_records_match_dispatched_items_on_success() {
    let (_tmp, root) = wide_tree(250);
    let opts = DigestOpts {
        num_threads: Some(5),
        ..Default::default()
    };
    let handles = start_pipeline(&root, &opts, CancelToken::new()).unwrap();
    let records: Vec<_> = handles.records.iter().collect();
    assert!(records.iter().all(|r| r.outcome.is_ok()));
    assert!(handles.walk_errors.recv().is_err(), "walk should end cleanly");
    let dispatched = handles.walk_handle.join().unwrap();
    assert_eq!(records.len(), dispatched);
    assert_eq!(dispatched, 250);
    let delivered: usize = handles
        .worker_handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .sum();
    assert_eq!(delivered, dispatched);
    handles.merge_handle.join().unwrap();
}

#[test]
fn test_join_stages_after_clean_run() {
    let (_tmp, root, expected) = fixture_tree();
    let handles = start_pipeline(&root, &DigestOpts::default(), CancelToken::new()).unwrap();
    assert_eq!(handles.records.iter().count(), expected.len());
    join_stages(
        handles.walk_handle,
        handles.worker_handles,
        handles.merge_handle,
    )
    .unwrap();
}
