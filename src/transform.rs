use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;
use tracing::info;

use crate::dataset::{ColumnKind, Dataset, NumericCell};
use crate::error::{EtlError, Result};
use crate::fetch;

/// `column` = base × rate of `code`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DerivedColumn {
    pub column: String,
    pub code: String,
}

impl DerivedColumn {
    pub fn new(column: &str, code: &str) -> Self {
        DerivedColumn { column: column.to_string(), code: code.to_string() }
    }
}

/// Currency/unit code → positive multiplicative rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionTable {
    rates: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct RateRow {
    #[serde(alias = "Currency", alias = "currency", alias = "Code")]
    code: String,
    #[serde(alias = "Rate")]
    rate: f64,
}

impl ConversionTable {
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut rates = BTreeMap::new();
        for (code, rate) in pairs {
            let code = code.into().trim().to_string();
            if !rate.is_finite() || rate <= 0.0 {
                return Err(EtlError::InvalidRate { code, reason: format!("{} is not positive", rate) });
            }
            if rates.insert(code.clone(), rate).is_some() {
                return Err(EtlError::InvalidRate { code, reason: "listed twice".into() });
            }
        }
        Ok(ConversionTable { rates })
    }

    /// Reads a delimited file with a header naming a code and a rate column.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut pairs = Vec::new();
        for row in rdr.deserialize::<RateRow>() {
            let row = row?;
            pairs.push((row.code, row.rate));
        }
        Self::from_pairs(pairs)
    }

    /// Loads from a local path or an http(s) URL.
    pub fn load(source: &str) -> Result<Self> {
        let text = fetch::read_source(source)?;
        let table = Self::from_reader(text.as_bytes())?;
        info!("Loaded {} exchange rates from {}", table.len(), source);
        Ok(table)
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Appends one column per `derived` entry, all or nothing.
///
/// Every rate and name is checked before the dataset is touched, so a
/// `MissingRate` leaves the columns exactly as they were.
pub fn transform(
    dataset: &mut Dataset,
    table: &ConversionTable,
    base_column: &str,
    derived: &[DerivedColumn],
    precision: u32,
) -> Result<()> {
    let base = dataset.column_id(base_column)?;
    if dataset.column(base).kind != ColumnKind::Numeric {
        return Err(EtlError::SchemaMismatch(format!("{} is not numeric", base_column)));
    }

    let mut plan: Vec<(&str, f64)> = Vec::with_capacity(derived.len());
    for d in derived {
        let rate = table
            .get(&d.code)
            .ok_or_else(|| EtlError::MissingRate { code: d.code.clone() })?;
        let taken = dataset.column_id(&d.column).is_ok()
            || plan.iter().any(|(name, _)| *name == d.column);
        if taken {
            return Err(EtlError::SchemaMismatch(format!(
                "column {} already exists",
                d.column
            )));
        }
        plan.push((d.column.as_str(), rate));
    }

    let columns: Vec<(&str, Vec<NumericCell>)> = plan
        .iter()
        .map(|&(name, rate)| {
            let values = dataset
                .records()
                .iter()
                .map(|r| r.numeric(base).scaled(rate, precision))
                .collect();
            (name, values)
        })
        .collect();

    for (name, values) in columns {
        dataset.append_numeric(name, values)?;
    }
    info!("Added {} derived columns from {}", derived.len(), base_column);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Cell, Column, Record};

    fn dataset(values: &[Option<f64>]) -> Dataset {
        let mut ds = Dataset::new(vec![Column::text("Name"), Column::numeric("MC_USD_Billion")]);
        for (i, v) in values.iter().enumerate() {
            let cell = v.map(|v| NumericCell::rounded(v, 2)).unwrap_or(NumericCell::NULL);
            ds.push(Record::new(vec![Cell::Text(format!("Bank {}", i)), Cell::Number(cell)]))
                .unwrap();
        }
        ds
    }

    fn rates() -> ConversionTable {
        ConversionTable::from_pairs([("GBP", 0.8), ("EUR", 0.93), ("INR", 82.95)]).unwrap()
    }

    fn usd_to_gbp_eur() -> Vec<DerivedColumn> {
        vec![
            DerivedColumn::new("MC_GBP_Billion", "GBP"),
            DerivedColumn::new("MC_EUR_Billion", "EUR"),
        ]
    }

    #[test]
    fn gbp_eur_scenario() {
        let mut ds = dataset(&[Some(100.0)]);
        transform(&mut ds, &rates(), "MC_USD_Billion", &usd_to_gbp_eur(), 2).unwrap();
        let gbp = ds.column_id("MC_GBP_Billion").unwrap();
        let eur = ds.column_id("MC_EUR_Billion").unwrap();
        assert_eq!(ds.records()[0].numeric(gbp).value(), Some(80.0));
        assert_eq!(ds.records()[0].numeric(eur).value(), Some(93.0));
        let names: Vec<_> = ds.column_names().collect();
        assert_eq!(names, ["Name", "MC_USD_Billion", "MC_GBP_Billion", "MC_EUR_Billion"]);
    }

    #[test]
    fn derived_is_rounded_product() {
        let bases = [432.92, 0.06, 157.91, 1.23];
        let mut ds = dataset(&bases.map(Some));
        let inr = [DerivedColumn::new("MC_INR_Billion", "INR")];
        transform(&mut ds, &rates(), "MC_USD_Billion", &inr, 2).unwrap();
        let id = ds.column_id("MC_INR_Billion").unwrap();
        for (record, base) in ds.records().iter().zip(bases) {
            let expected = crate::dataset::round_to(base * 82.95, 2);
            assert_eq!(record.numeric(id).value(), Some(expected));
        }
    }

    #[test]
    fn null_base_gives_null() {
        let mut ds = dataset(&[None, Some(10.0)]);
        transform(&mut ds, &rates(), "MC_USD_Billion", &usd_to_gbp_eur(), 2).unwrap();
        let gbp = ds.column_id("MC_GBP_Billion").unwrap();
        assert!(ds.records()[0].numeric(gbp).is_null());
        assert_eq!(ds.records()[1].numeric(gbp).value(), Some(8.0));
    }

    #[test]
    fn overflowing_product_is_null() {
        let cleaner = crate::extract::clean::RecordCleaner::new(crate::extract::clean::CleanRules {
            divisor: Some(1000.0),
            ..Default::default()
        });
        let huge = cleaner.clean("9e307");
        assert!(huge.value().is_some());

        let mut ds = dataset(&[huge.value()]);
        let inr = [DerivedColumn::new("MC_INR_Billion", "INR")];
        transform(&mut ds, &rates(), "MC_USD_Billion", &inr, 2).unwrap();
        let id = ds.column_id("MC_INR_Billion").unwrap();
        assert!(ds.records()[0].numeric(id).is_null());
    }

    #[test]
    fn missing_rate_is_atomic() {
        let mut ds = dataset(&[Some(1.0), Some(2.0)]);
        let before = ds.clone();
        let mut s = usd_to_gbp_eur();
        s.push(DerivedColumn::new("MC_JPY_Billion", "JPY"));
        let err = transform(&mut ds, &rates(), "MC_USD_Billion", &s, 2).unwrap_err();
        assert!(matches!(err, EtlError::MissingRate { ref code } if code == "JPY"));
        assert_eq!(ds, before);
    }

    #[test]
    fn existing_column_rejected() {
        let mut ds = dataset(&[Some(1.0)]);
        let s = [DerivedColumn::new("Name", "GBP")];
        assert!(transform(&mut ds, &rates(), "MC_USD_Billion", &s, 2).is_err());
        assert_eq!(ds.columns().len(), 2);
    }

    #[test]
    fn empty_dataset_gets_columns() {
        let mut ds = dataset(&[]);
        transform(&mut ds, &rates(), "MC_USD_Billion", &usd_to_gbp_eur(), 2).unwrap();
        assert_eq!(ds.columns().len(), 4);
        assert!(ds.is_empty());
    }

    #[test]
    fn rate_file_parsing() {
        let table = ConversionTable::load("tests/fixtures/exchange_rate.csv").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("GBP"), Some(0.8));
        assert_eq!(table.get("INR"), Some(82.95));
        assert_eq!(table.get("JPY"), None);
    }

    #[test]
    fn rate_file_with_lowercase_header() {
        let csv = "code,rate\nEUR, 0.93\n";
        let table = ConversionTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.get("EUR"), Some(0.93));
    }

    #[test]
    fn bad_rates_rejected() {
        assert!(ConversionTable::from_pairs([("GBP", 0.0)]).is_err());
        assert!(ConversionTable::from_pairs([("GBP", f64::NAN)]).is_err());
        assert!(ConversionTable::from_pairs([("GBP", 0.8), ("GBP", 0.81)]).is_err());
    }
}
