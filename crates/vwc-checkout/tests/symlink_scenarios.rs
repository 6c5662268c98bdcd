//! End-to-end checkout scenarios around symlinks, driven through
//! [`WorkingCopy`] against an in-memory backing store.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use vwc_checkout::{CheckoutConfig, CommitOptions, UpdateOptions, WorkingCopy};
use vwc_crypto::ContentHasher;
use vwc_store::{BackingStore, Delta, Entry, InMemoryObjectStore, ObjectBackingStore, ObjectKind};
use vwc_types::{CommitId, EntryKind, RepoPath};
use vwc_workdir::{DiskKind, SymlinkPolicy};

fn p(s: &str) -> RepoPath {
    RepoPath::new(s).unwrap()
}

/// A backing repository with the commits the scenarios move between.
struct Backing {
    dir: tempfile::TempDir,
    store: Arc<dyn BackingStore>,
    objects: Arc<InMemoryObjectStore>,
    /// `adir/hello.txt` only.
    simple: CommitId,
    /// Adds `symlink -> adir/hello.txt`.
    symlink: CommitId,
    /// Adds a regular file `symlink` whose content is `adir/hello.txt`.
    quasi_symlink: CommitId,
}

impl Backing {
    fn new() -> Self {
        let objects = Arc::new(InMemoryObjectStore::new());
        let store: Arc<dyn BackingStore> = Arc::new(ObjectBackingStore::new(objects.clone()));

        let mut delta = Delta::new();
        delta.upsert(Entry::file(p("adir/hello.txt"), "hola"));
        let simple = store.commit(None, &delta, "Initial commit.").unwrap();

        let mut delta = Delta::new();
        delta.upsert(Entry::symlink(p("symlink"), "adir/hello.txt"));
        let symlink = store
            .commit(Some(&simple), &delta, "Add symlink pointing to adir/hello.txt")
            .unwrap();

        let mut delta = Delta::new();
        delta.upsert(Entry::file(p("symlink"), "adir/hello.txt"));
        let quasi_symlink = store
            .commit(Some(&simple), &delta, "Add symlink lookalike")
            .unwrap();

        Self {
            dir: tempfile::tempdir().unwrap(),
            store,
            objects,
            simple,
            symlink,
            quasi_symlink,
        }
    }

    /// A fresh checkout of the simple commit.
    fn checkout(&self, policy: SymlinkPolicy) -> WorkingCopy {
        let wc = WorkingCopy::open(
            self.dir.path().join("checkout"),
            Arc::clone(&self.store),
            CheckoutConfig::with_policy(policy),
        )
        .unwrap();
        assert!(wc.update(&self.simple, false).unwrap().is_complete());
        wc
    }
}

fn read(wc: &WorkingCopy, path: &str) -> String {
    String::from_utf8(wc.read_file(&p(path)).unwrap()).unwrap()
}

fn status(wc: &WorkingCopy) -> BTreeMap<String, char> {
    wc.status().unwrap().to_code_map()
}

fn expect_status(wc: &WorkingCopy, expected: &[(&str, char)]) {
    let expected: BTreeMap<String, char> = expected
        .iter()
        .map(|(path, code)| (path.to_string(), *code))
        .collect();
    assert_eq!(status(wc), expected);
}

fn write(wc: &WorkingCopy, path: &str, content: &str) {
    let abs = p(path).to_fs_path(wc.root());
    std::fs::create_dir_all(abs.parent().unwrap()).unwrap();
    std::fs::write(abs, content).unwrap();
}

fn delete(wc: &WorkingCopy, path: &str) {
    std::fs::remove_file(p(path).to_fs_path(wc.root())).unwrap();
}

#[cfg(unix)]
fn link(wc: &WorkingCopy, path: &str, target: &str) {
    std::os::unix::fs::symlink(target, p(path).to_fs_path(wc.root())).unwrap();
}

fn commit(wc: &WorkingCopy, message: &str) -> CommitId {
    wc.commit(message, CommitOptions::addremove()).unwrap()
}

// -- symlinks enabled ----------------------------------------------------

#[cfg(unix)]
mod enabled {
    use super::*;

    fn checkout() -> (Backing, WorkingCopy) {
        let backing = Backing::new();
        let wc = backing.checkout(SymlinkPolicy::Enabled);
        (backing, wc)
    }

    #[test]
    fn update_to_symlink() {
        let (b, wc) = checkout();
        wc.update(&b.quasi_symlink, false).unwrap();
        assert_eq!(read(&wc, "symlink"), "adir/hello.txt");
        let result = wc.update(&b.symlink, false).unwrap();
        assert!(result.is_complete());
        assert_eq!(read(&wc, "symlink"), "hola");
    }

    #[test]
    fn update_from_symlink() {
        let (b, wc) = checkout();
        wc.update(&b.symlink, false).unwrap();
        assert_eq!(read(&wc, "symlink"), "hola");
        wc.update(&b.quasi_symlink, false).unwrap();
        assert_eq!(read(&wc, "symlink"), "adir/hello.txt");
        expect_status(&wc, &[]);
    }

    #[test]
    fn show_symlink_commit() {
        let (b, wc) = checkout();
        wc.update(&b.symlink, false).unwrap();
        assert_eq!(
            wc.show_commit(&b.symlink).unwrap(),
            "diff --git a/symlink b/symlink\n\
             new file mode 120000\n\
             --- /dev/null\n\
             +++ b/symlink\n\
             @@ -0,0 +1,1 @@\n\
             +adir/hello.txt\n\
             \\ No newline at end of file\n"
        );
    }

    #[test]
    fn move_symlink() {
        let (b, wc) = checkout();
        wc.update(&b.symlink, false).unwrap();
        wc.rename(&p("symlink"), &p("symbolic_link")).unwrap();
        let moved = commit(&wc, "Moving symlink");

        assert_eq!(read(&wc, "symbolic_link"), "hola");
        expect_status(&wc, &[]);
        assert_eq!(
            wc.show_commit(&moved).unwrap(),
            "diff --git a/symlink b/symbolic_link\n\
             rename from symlink\n\
             rename to symbolic_link\n"
        );
    }

    #[test]
    fn modified_symlink_target() {
        let (b, wc) = checkout();
        wc.update(&b.symlink, false).unwrap();
        expect_status(&wc, &[]);

        write(&wc, "adir/true_hola.txt", "hola");
        delete(&wc, "symlink");
        link(&wc, "symlink", "adir/true_hola.txt");

        expect_status(&wc, &[("adir/true_hola.txt", '?'), ("symlink", 'M')]);
        assert_eq!(
            wc.diff().unwrap(),
            "diff --git a/symlink b/symlink\n\
             --- a/symlink\n\
             +++ b/symlink\n\
             @@ -1,1 +1,1 @@\n\
             -adir/hello.txt\n\
             \\ No newline at end of file\n\
             +adir/true_hola.txt\n\
             \\ No newline at end of file\n"
        );
    }

    #[test]
    fn symlink_diff_both_ways() {
        let (b, wc) = checkout();
        wc.update(&b.symlink, false).unwrap();
        delete(&wc, "symlink");
        write(&wc, "symlink", "adir/hello.txt");
        assert_eq!(
            wc.diff().unwrap(),
            "diff --git a/symlink b/symlink\nold mode 120000\nnew mode 100644\n"
        );

        let result = wc.update(&b.quasi_symlink, true).unwrap();
        assert!(result.is_complete());
        delete(&wc, "symlink");
        link(&wc, "symlink", "adir/hello.txt");
        assert_eq!(
            wc.diff().unwrap(),
            "diff --git a/symlink b/symlink\nold mode 100644\nnew mode 120000\n"
        );
    }

    #[test]
    fn directory_listing_reports_symlink() {
        let (b, wc) = checkout();
        wc.update(&b.symlink, false).unwrap();
        let listing = wc.list_directory(&RepoPath::root()).unwrap();
        let entry = listing.iter().find(|e| e.name == "symlink").unwrap();
        assert_eq!(entry.kind, DiskKind::Symlink);
        assert!(listing.iter().all(|e| e.name != ".vwc"));
    }

    #[test]
    fn revert_restores_missing_symlink() {
        let (b, wc) = checkout();
        wc.update(&b.symlink, false).unwrap();
        delete(&wc, "symlink");
        expect_status(&wc, &[("symlink", '!')]);

        wc.revert_all().unwrap();
        expect_status(&wc, &[]);
        assert_eq!(read(&wc, "symlink"), "hola");
    }

    #[test]
    fn manually_restoring_symlink() {
        let (b, wc) = checkout();
        wc.update(&b.symlink, false).unwrap();
        delete(&wc, "symlink");
        expect_status(&wc, &[("symlink", '!')]);

        link(&wc, "symlink", "adir/hello.txt");
        expect_status(&wc, &[]);
        assert_eq!(read(&wc, "symlink"), "hola");
    }

    #[test]
    fn update_away_from_new_symlink_commit() {
        let (b, wc) = checkout();
        wc.update(&b.symlink, false).unwrap();
        link(&wc, "symlink3", "adir/hello.txt");
        commit(&wc, "Another commit with a symlink");

        let result = wc.update(&b.simple, false).unwrap();
        assert!(result.is_complete());
        expect_status(&wc, &[]);
        assert!(!wc.root().join("symlink3").exists());
    }

    #[test]
    fn file_symlink_chain() {
        let (b, wc) = checkout();
        link(&wc, "f1", "adir/hello.txt");
        link(&wc, "f2", "f1");
        link(&wc, "f3", "f2");
        let chain = commit(&wc, "Chain of symlinks pointing to a file in a dir");
        expect_status(&wc, &[]);

        wc.update(&b.simple, true).unwrap();
        assert!(!wc.is_file(&p("f3")));
        wc.update(&chain, false).unwrap();
        assert!(wc.is_file(&p("f3")));
        assert_eq!(read(&wc, "f3"), "hola");
    }

    #[test]
    fn dir_symlink_chain() {
        let (b, wc) = checkout();
        link(&wc, "d1", "adir");
        link(&wc, "d2", "d1");
        link(&wc, "d3", "d2");
        assert!(wc.is_dir(&p("d3")));
        let chain = commit(&wc, "Chain of symlinks pointing to a directory");
        expect_status(&wc, &[]);

        wc.update(&b.simple, true).unwrap();
        wc.update(&chain, false).unwrap();
        assert!(wc.is_dir(&p("d3")));
        assert_eq!(read(&wc, "d3/hello.txt"), "hola");
    }

    #[test]
    fn symlink_cycle_is_neither_file_nor_directory() {
        let (b, wc) = checkout();
        link(&wc, "s0", "s2");
        link(&wc, "s1", "s0");
        link(&wc, "s2", "s1");
        let cycle = commit(&wc, "Cycle of symlinks");
        expect_status(&wc, &[]);

        wc.update(&b.simple, true).unwrap();
        let result = wc.update(&cycle, false).unwrap();
        assert!(result.is_complete());
        for i in 0..3 {
            let path = p(&format!("s{i}"));
            assert!(!wc.is_file(&path));
            assert!(!wc.is_dir(&path));
            let target = wc.read_link(&path).unwrap();
            assert_eq!(target, format!("s{}", (i + 2) % 3).into_bytes());
        }
        assert!(matches!(
            wc.read_file(&p("s0")),
            Err(vwc_checkout::CheckoutError::Resolve(
                vwc_workdir::ResolveError::Unresolvable { .. }
            ))
        ));
    }

    #[test]
    fn status_through_directory_symlink() {
        let (_b, wc) = checkout();
        link(&wc, "dirlink", "adir");
        commit(&wc, "Really simple commit w/ repo");
        write(&wc, "adir/hello.txt", "saluton");
        expect_status(&wc, &[("adir/hello.txt", 'M')]);
    }

    #[test]
    fn round_trip_restores_the_tree() {
        let (b, wc) = checkout();
        let before = wc.list_directory(&RepoPath::root()).unwrap();
        wc.update(&b.symlink, false).unwrap();
        wc.update(&b.quasi_symlink, false).unwrap();
        wc.update(&b.simple, false).unwrap();
        assert_eq!(wc.list_directory(&RepoPath::root()).unwrap(), before);
        expect_status(&wc, &[]);
    }
}

// -- symlinks disabled ---------------------------------------------------

mod disabled {
    use super::*;

    struct DisabledBacking {
        _backing: Backing,
        initial: CommitId,
        wc: WorkingCopy,
    }

    /// `contents1`, `contents2` and `symlink -> contents1`, checked out
    /// with links disabled.
    fn checkout() -> DisabledBacking {
        let backing = Backing::new();
        let mut delta = Delta::new();
        delta
            .upsert(Entry::file(p("contents1"), "c1\n"))
            .upsert(Entry::file(p("contents2"), "c2\n"))
            .upsert(Entry::symlink(p("symlink"), "contents1"));
        let initial = backing.store.commit(None, &delta, "Initial commit.").unwrap();

        let wc = WorkingCopy::open(
            backing.dir.path().join("disabled"),
            Arc::clone(&backing.store),
            CheckoutConfig::with_policy(SymlinkPolicy::Disabled),
        )
        .unwrap();
        assert!(wc.update(&initial, false).unwrap().is_complete());
        DisabledBacking {
            _backing: backing,
            initial,
            wc,
        }
    }

    #[test]
    fn fresh_checkout_is_clean_with_quasi_symlink() {
        let d = checkout();
        expect_status(&d.wc, &[]);
        assert_eq!(read(&d.wc, "symlink"), "contents1");
        let meta = std::fs::symlink_metadata(d.wc.root().join("symlink")).unwrap();
        assert!(!meta.file_type().is_symlink());
        assert_eq!(d.wc.read_link(&p("symlink")).unwrap(), b"contents1");
        expect_status(&d.wc, &[]);
    }

    #[test]
    fn edited_quasi_symlink_diffs_as_target_change() {
        let d = checkout();
        write(&d.wc, "symlink", "contents2");
        expect_status(&d.wc, &[("symlink", 'M')]);
        assert!(d.wc.diff().unwrap().contains("-contents1\n\\ No newline at end of file\n"));
    }

    #[cfg(unix)]
    #[test]
    fn changed_symlink_shows_up_in_status() {
        let d = checkout();
        delete(&d.wc, "symlink");
        link(&d.wc, "symlink", "contents2");
        assert_eq!(read(&d.wc, "symlink"), "c2\n");
        expect_status(&d.wc, &[("symlink", 'M')]);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_replacement_after_clean_update() {
        let d = checkout();
        link(&d.wc, "symlink2", "contents2");
        assert_eq!(read(&d.wc, "symlink2"), "c2\n");
        let with_link = commit(&d.wc, "Another commit with a symlink");

        d.wc.update(&d.initial, true).unwrap();
        d.wc.update(&with_link, true).unwrap();
        assert_eq!(read(&d.wc, "symlink2"), "contents2");

        delete(&d.wc, "symlink2");
        link(&d.wc, "symlink2", "contents2");
        expect_status(&d.wc, &[]);
    }

    #[cfg(unix)]
    #[test]
    fn disabled_symlinks_update() {
        let d = checkout();
        link(&d.wc, "symlink2", "contents2");
        commit(&d.wc, "Another commit with a symlink");

        let result = d.wc.update(&d.initial, false).unwrap();
        assert!(result.is_complete());
        expect_status(&d.wc, &[]);
        assert_eq!(read(&d.wc, "symlink"), "contents1");
    }

    #[cfg(unix)]
    #[test]
    fn modified_fake_symlink_target() {
        let d = checkout();
        expect_status(&d.wc, &[]);
        delete(&d.wc, "symlink");
        link(&d.wc, "symlink", "contents2");
        expect_status(&d.wc, &[("symlink", 'M')]);
        assert_eq!(
            d.wc.diff().unwrap(),
            "diff --git a/symlink b/symlink\n\
             --- a/symlink\n\
             +++ b/symlink\n\
             @@ -1,1 +1,1 @@\n\
             -contents1\n\
             \\ No newline at end of file\n\
             +contents2\n\
             \\ No newline at end of file\n"
        );
    }

    #[test]
    fn quasi_symlink_survives_rename_and_commit() {
        let d = checkout();
        d.wc.rename(&p("symlink"), &p("moved")).unwrap();
        let moved = commit(&d.wc, "move");
        assert_eq!(
            d.wc.show_commit(&moved).unwrap(),
            "diff --git a/symlink b/moved\nrename from symlink\nrename to moved\n"
        );
        expect_status(&d.wc, &[]);
    }
}

// -- policy-independent --------------------------------------------------

#[cfg(unix)]
#[test]
fn retargeted_symlink_commits_identically_under_both_policies() {
    let b = Backing::new();
    let open = |name: &str, policy| {
        let wc = WorkingCopy::open(
            b.dir.path().join(name),
            Arc::clone(&b.store),
            CheckoutConfig::with_policy(policy),
        )
        .unwrap();
        assert!(wc.update(&b.symlink, false).unwrap().is_complete());
        wc
    };
    let real = open("real", SymlinkPolicy::Enabled);
    let quasi = open("quasi", SymlinkPolicy::Disabled);
    let commits_before = b.objects.count(ObjectKind::Commit);

    delete(&real, "symlink");
    link(&real, "symlink", "adir");
    write(&quasi, "symlink", "adir");
    expect_status(&real, &[("symlink", 'M')]);
    expect_status(&quasi, &[("symlink", 'M')]);

    let from_real = commit(&real, "Point symlink at adir");
    let from_quasi = commit(&quasi, "Point symlink at adir");
    assert_eq!(from_real, from_quasi);
    assert_eq!(b.objects.count(ObjectKind::Commit), commits_before + 1);

    let real_tree = b.store.get_snapshot(&from_real).unwrap();
    let quasi_tree = b.store.get_snapshot(&from_quasi).unwrap();
    let entry = real_tree.get(&p("symlink")).unwrap();
    assert_eq!(entry.kind, EntryKind::Symlink);
    assert_eq!(entry.hash, ContentHasher::hash_entry(EntryKind::Symlink, b"adir"));
    assert_eq!(quasi_tree.get(&p("symlink")), Some(entry));
    assert_eq!(
        real_tree.entries().collect::<Vec<_>>(),
        quasi_tree.entries().collect::<Vec<_>>()
    );
}

#[test]
fn quasi_checkout_of_symlink_commit_has_nothing_to_commit() {
    let b = Backing::new();
    let quasi = WorkingCopy::open(
        b.dir.path().join("quasi"),
        Arc::clone(&b.store),
        CheckoutConfig::with_policy(SymlinkPolicy::Disabled),
    )
    .unwrap();
    quasi.update(&b.symlink, false).unwrap();
    expect_status(&quasi, &[]);
    assert!(matches!(
        quasi.commit("nothing", CommitOptions::addremove()),
        Err(vwc_checkout::CheckoutError::NothingToCommit)
    ));
}

#[test]
fn cancelled_update_keeps_the_parent() {
    let b = Backing::new();
    let wc = b.checkout(SymlinkPolicy::Disabled);
    let flag = Arc::new(AtomicBool::new(true));
    let result = wc
        .update_with(Some(&b.symlink), UpdateOptions::default().with_cancel(flag))
        .unwrap();
    assert!(result.cancelled);
    assert_eq!(wc.parent(), Some(b.simple));
    expect_status(&wc, &[]);
}

#[test]
fn status_runs_concurrently() {
    let b = Backing::new();
    let wc = Arc::new(b.checkout(SymlinkPolicy::Disabled));
    wc.update(&b.symlink, false).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let wc = Arc::clone(&wc);
            std::thread::spawn(move || wc.status().unwrap().is_clean())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(wc.phase(), vwc_checkout::Phase::Idle);
}
