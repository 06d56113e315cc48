// Advisory single-page-application detection

use crate::error::Result;
use crate::page::Page;

/// Script name fragments of common SPA frameworks and bundlers.
pub const SPA_INDICATORS: &[&str] = &[
    "react", "vue", "angular", "next.js", "nuxt", "svelte", "webpack", "parcel", "vite",
];

/// True when any script source names a known framework or bundler, or the
/// document has a framework root element.
pub fn looks_like_spa(script_sources: &[String], has_framework_root: bool) -> bool {
    let has_framework = script_sources.iter().any(|src| {
        let src = src.to_lowercase();
        SPA_INDICATORS.iter().any(|indicator| src.contains(indicator))
    });

    has_framework || has_framework_root
}

pub fn probe_page(page: &impl Page) -> Result<bool> {
    Ok(looks_like_spa(
        &page.script_sources()?,
        page.has_framework_root(),
    ))
}
