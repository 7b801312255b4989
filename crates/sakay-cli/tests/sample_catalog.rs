//! The catalog shipped in `config/` must stay loadable.

use std::path::PathBuf;

use sakay_cli::catalog::{run_catalog, summarize, CatalogArgs};
use sakay_cli::load_catalog;

fn sample_catalog() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop(); // crates
    path.pop(); // repo root
    path.join("config").join("catalog.yaml")
}

#[test]
fn shipped_catalog_validates() {
    let args = CatalogArgs {
        path: sample_catalog(),
    };
    assert_eq!(run_catalog(&args).unwrap(), 0);
}

#[test]
fn shipped_catalog_lists_every_promo() {
    let catalog = load_catalog(Some(&sample_catalog())).unwrap();
    let text = summarize(&catalog).unwrap();
    for code in ["SAKAY10", "FOODIE100", "FREEDEL"] {
        assert!(text.contains(code), "{code} missing from:\n{text}");
    }
    assert!(text.contains("free delivery"));
}
