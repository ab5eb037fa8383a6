use bunch::config::Settings;
use bunch::deps::remote::{RemoteListing, RemoteRef};
use bunch::deps::resolve;
use bunch::import::{GoImportScanner, ImportSource};
use bunch::lock::Lockfile;
use bunch::manifest::{Manifest, PackageSpec};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::path::Path;

const MOCK_MANIFEST: &str = r#"# web stack
github.com/gorilla/mux v1.8.0
github.com/gorilla/websocket  # realtime
github.com/lib/pq master

# tooling
golang.org/x/net
golang.org/x/sys 5d8ff6d2b5fd8e3a5bd7c254a5af6c85c3d2a39b
github.com/stretchr/testify ^1.8
"#;

const MOCK_LOCK: &str = r#"
[metadata]
version = 1
generator = "bunch 0.1.0"

[[package]]
name = "github.com/gorilla/mux"
rev = "98cb6bf42e086f6af920b965c38cacc07402d51b"

[[package]]
name = "github.com/lib/pq"
rev = "3d613208bca2e74f2a20e04126ed30bcb5c4cc27"

[[package]]
name = "golang.org/x/net"
rev = "b3c676e531a68e0e3e33bc2d0e197d45d3e1fc03"
"#;

const MOCK_CONFIG: &str = r#"
jobs = 8
timeout_secs = 30
search_path = "prepend"

[sources]
"example.com/private/lib" = "git@example.com:private/lib.git"

[rewrite]
"github.com/" = "https://mirror.local/github.com/"
"github.com/acme/" = "https://git.acme.internal/"
"#;

fn bench_manifest(c: &mut Criterion) {
    let path = Path::new("Bunchfile");
    c.bench_function("parse_bunchfile", |b| {
        b.iter(|| Manifest::parse(black_box(MOCK_MANIFEST), path).unwrap())
    });

    let manifest = Manifest::parse(MOCK_MANIFEST, path).unwrap();
    c.bench_function("render_bunchfile", |b| b.iter(|| black_box(&manifest).render()));
}

fn bench_lock_parse(c: &mut Criterion) {
    let path = Path::new("Bunchfile.lock");
    c.bench_function("parse_bunchfile_lock", |b| {
        b.iter(|| Lockfile::parse(black_box(MOCK_LOCK), path).unwrap())
    });
}

fn bench_settings(c: &mut Criterion) {
    let settings = Settings::parse(MOCK_CONFIG, Path::new("bunch.toml")).unwrap();
    c.bench_function("source_url_rewrite", |b| {
        b.iter(|| {
            let _ = settings.source_url(black_box("github.com/acme/widgets"));
            let _ = settings.source_url(black_box("github.com/pkg/errors"));
            let _ = settings.source_url(black_box("golang.org/x/net"));
        })
    });
}

/// A remote with many release tags, like a long-lived library.
fn large_listing() -> RemoteListing {
    let mut refs = vec![
        RemoteRef {
            name: "HEAD".into(),
            oid: "a".repeat(40),
        },
        RemoteRef {
            name: "refs/heads/master".into(),
            oid: "a".repeat(40),
        },
    ];
    for major in 0..5 {
        for minor in 0..40 {
            refs.push(RemoteRef {
                name: format!("refs/tags/v{major}.{minor}.0"),
                oid: format!("{:040x}", major * 100 + minor),
            });
        }
    }
    RemoteListing {
        default_branch: Some("master".into()),
        refs,
    }
}

fn bench_select(c: &mut Criterion) {
    let listing = large_listing();
    let exact = PackageSpec::new("github.com/acme/lib", Some("v3.12.0".into())).unwrap();
    let req = PackageSpec::new("github.com/acme/lib", Some("^2.5".into())).unwrap();

    c.bench_function("select_exact_tag", |b| {
        b.iter(|| resolve::select(black_box(&exact), black_box(&listing)).unwrap())
    });
    c.bench_function("select_semver_requirement", |b| {
        b.iter(|| resolve::select(black_box(&req), black_box(&listing)).unwrap())
    });
}

fn bench_scan_imports(c: &mut Criterion) {
    let temp_dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        let dir = temp_dir.path().join(format!("pkg{i}"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("main.go"),
            "package main\n\nimport (\n\t\"fmt\"\n\t\"github.com/pkg/errors\"\n\t\"golang.org/x/net/context\"\n)\n\nfunc main() { fmt.Println() }\n",
        )
        .unwrap();
    }

    let scanner = GoImportScanner::default();
    c.bench_function("scan_go_imports", |b| {
        b.iter(|| scanner.candidates(black_box(temp_dir.path())).unwrap())
    });
}

criterion_group!(
    benches,
    bench_manifest,
    bench_lock_parse,
    bench_settings,
    bench_select,
    bench_scan_imports
);
criterion_main!(benches);
