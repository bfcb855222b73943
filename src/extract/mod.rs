pub mod clean;
pub mod locate;
pub mod rows;

use scraper::Html;

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use clean::RecordCleaner;

/// Page HTML → located table → filtered rows → cleaned dataset.
pub fn extract_dataset(html: &str, config: &PipelineConfig) -> Result<Dataset> {
    let doc = Html::parse_document(html);
    let table = locate::locate(&doc, &config.table)?;
    let cleaner = RecordCleaner::new(config.clean.clone());
    rows::extract(table, &config.column_schema, &config.rows, &cleaner)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use crate::error::EtlError;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn banks_fixture() {
        let config = Preset::Banks.config();
        let ds = extract_dataset(&fixture("banks"), &config).unwrap();
        let name = ds.column_id("Name").unwrap();
        let cap = ds.column_id("MC_USD_Billion").unwrap();

        // Seven bank rows; the footnote row is dropped.
        assert_eq!(ds.len(), 7);
        assert_eq!(ds.records()[0].text(name), Some("JPMorgan Chase"));
        assert_eq!(ds.records()[0].numeric(cap).value(), Some(432.92));
        // "-" is the page's explicit zero.
        assert_eq!(ds.records()[5].numeric(cap).value(), Some(0.0));
        // "n.a." does not parse and is kept as null.
        assert_eq!(ds.records()[6].text(name), Some("Mitsubishi UFJ Financial Group"));
        assert!(ds.records()[6].numeric(cap).is_null());
    }

    #[test]
    fn banks_ignores_first_wikitable() {
        let config = Preset::Banks.config();
        let ds = extract_dataset(&fixture("banks"), &config).unwrap();
        let name = ds.column_id("Name").unwrap();
        assert!(ds.records().iter().all(|r| r.text(name) != Some("Total assets leader")));
    }

    #[test]
    fn gdp_fixture() {
        let config = Preset::Gdp.config();
        let ds = extract_dataset(&fixture("gdp"), &config).unwrap();
        let country = ds.column_id("Country").unwrap();
        let gdp = ds.column_id("GDP_USD_billions").unwrap();

        let names: Vec<_> = ds.records().iter().filter_map(|r| r.text(country)).collect();
        // "World" has no link, Afghanistan has an em-dash estimate.
        assert_eq!(names, ["United States", "China", "Japan", "Germany", "India", "Tuvalu"]);
        assert_eq!(ds.records()[0].numeric(gdp).value(), Some(26854.6));
        assert_eq!(ds.records()[4].numeric(gdp).value(), Some(3732.22));
        assert_eq!(ds.records()[5].numeric(gdp).value(), Some(0.06));
    }

    #[test]
    fn missing_table_aborts() {
        let config = Preset::Gdp.config();
        let err = extract_dataset("<html><body><p>maintenance</p></body></html>", &config)
            .unwrap_err();
        assert!(matches!(err, EtlError::NotFound(_)));
    }
}
