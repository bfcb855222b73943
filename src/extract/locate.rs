use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::error::{EtlError, Result};

/// The located data table; borrows the parsed document.
pub type TableHandle<'a> = ElementRef<'a>;

/// Picks the `index`-th (0-based) element matching `css`. Purely positional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableSelector {
    pub css: String,
    pub index: usize,
}

pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| EtlError::Config(format!("bad CSS selector {:?}: {:?}", css, e)))
}

pub fn locate<'a>(doc: &'a Html, target: &TableSelector) -> Result<TableHandle<'a>> {
    let selector = parse_selector(&target.css)?;
    let mut matches = doc.select(&selector);
    if let Some(table) = matches.nth(target.index) {
        return Ok(table);
    }
    let found = doc.select(&selector).count();
    Err(EtlError::NotFound(format!(
        "expected at least {} `{}` elements, found {}",
        target.index + 1,
        target.css,
        found
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <table class="wikitable"><tbody><tr><td>first</td></tr></tbody></table>
          <table class="infobox"><tbody><tr><td>ignored</td></tr></tbody></table>
          <table class="wikitable sortable"><tbody><tr><td>second</td></tr></tbody></table>
        </body></html>"#;

    fn text(el: TableHandle) -> String {
        el.text().collect::<String>().trim().to_string()
    }

    #[test]
    fn second_match_by_class() {
        let doc = Html::parse_document(PAGE);
        let sel = TableSelector { css: "table.wikitable".into(), index: 1 };
        assert_eq!(text(locate(&doc, &sel).unwrap()), "second");
    }

    #[test]
    fn nth_tbody() {
        let doc = Html::parse_document(PAGE);
        let sel = TableSelector { css: "tbody".into(), index: 1 };
        assert_eq!(text(locate(&doc, &sel).unwrap()), "ignored");
    }

    #[test]
    fn too_few_matches() {
        let doc = Html::parse_document(PAGE);
        let sel = TableSelector { css: "table.wikitable".into(), index: 2 };
        match locate(&doc, &sel) {
            Err(EtlError::NotFound(msg)) => assert!(msg.contains("found 2"), "{msg}"),
            other => panic!("expected NotFound, got {:?}", other.map(text)),
        }
    }

    #[test]
    fn empty_page() {
        let doc = Html::parse_document("");
        let sel = TableSelector { css: "tbody".into(), index: 0 };
        assert!(matches!(locate(&doc, &sel), Err(EtlError::NotFound(_))));
    }

    #[test]
    fn invalid_selector() {
        let doc = Html::parse_document(PAGE);
        let sel = TableSelector { css: "table[".into(), index: 0 };
        assert!(matches!(locate(&doc, &sel), Err(EtlError::Config(_))));
    }
}
