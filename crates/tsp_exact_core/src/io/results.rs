use std::{collections::BTreeMap, path::Path};

use crate::{Error, Result};

const CSV_HEADER: [&str; 2] = ["Instance", "Mejor_solucion"];

/// Rounds a tour cost to three decimals.
pub fn round_cost(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Trimmed, ASCII-lowercased instance name used as the result key.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Best cost per instance, keyed by normalized name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultTable {
    costs: BTreeMap<String, f64>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the rounded cost for `name`. A later entry for the same
    /// normalized name replaces the earlier one.
    pub fn insert(&mut self, name: &str, cost: f64) -> Option<f64> {
        let key = normalize_name(name);
        let cost = round_cost(cost);
        let previous = self.costs.insert(key.clone(), cost);
        if let Some(previous) = previous {
            log::warn!("results.duplicate: name={key} previous={previous:.3} replacement={cost:.3}");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.costs.get(&normalize_name(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.costs.iter().map(|(name, cost)| (name.as_str(), *cost))
    }

    /// Writes `Instance,Mejor_solucion` rows. An empty table is an error and
    /// leaves `path` untouched.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.is_empty() {
            return Err(Error::NoResults);
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(CSV_HEADER)?;
        for (name, cost) in self.iter() {
            let cost = format!("{cost:.3}");
            writer.write_record([name, cost.as_str()])?;
        }
        writer.flush()?;

        log::info!("results.written: path={} rows={}", path.display(), self.len());
        Ok(())
    }
}

impl<'a> Extend<(&'a str, f64)> for ResultTable {
    fn extend<T: IntoIterator<Item = (&'a str, f64)>>(&mut self, iter: T) {
        for (name, cost) in iter {
            self.insert(name, cost);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::PathBuf,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::{ResultTable, normalize_name, round_cost};
    use crate::Error;

    fn unique_temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("tsp-exact-tests-{name}-{nanos}"))
    }

    #[test]
    fn rounds_to_three_decimals() {
        assert_eq!(round_cost(12.0), 12.0);
        assert_eq!(round_cost(1.23449), 1.234);
        assert_eq!(round_cost(1.2346), 1.235);
        assert_eq!(format!("{:.3}", round_cost(7.0)), "7.000");
    }

    #[test]
    fn names_are_trimmed_and_lowercased() {
        assert_eq!(normalize_name("  Berlin52 "), "berlin52");
    }

    #[test]
    fn later_duplicate_replaces_earlier_value() {
        let mut table = ResultTable::new();
        assert_eq!(table.insert("Tri", 12.0), None);
        assert_eq!(table.insert("tri ", 13.0), Some(12.0));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("TRI"), Some(13.0));
    }

    #[test]
    fn rows_are_sorted_by_normalized_name() {
        let mut table = ResultTable::new();
        table.extend([("b", 2.0), ("A", 1.0), ("c", 3.0)]);
        let names: Vec<&str> = table.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn writes_csv_with_header_and_fixed_decimals() {
        let dir = unique_temp_dir("results-csv");
        fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("mejores_soluciones.csv");

        let mut table = ResultTable::new();
        table.insert("tri3", 12.0);
        table.insert("square", 4.00049);
        table.write_csv(&path).expect("write csv");

        let text = fs::read_to_string(&path).expect("read csv");
        assert_eq!(text, "Instance,Mejor_solucion\nsquare,4.000\ntri3,12.000\n");

        fs::remove_dir_all(&dir).expect("cleanup temp dir");
    }

    #[test]
    fn empty_table_writes_nothing() {
        let dir = unique_temp_dir("results-empty");
        fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("out.csv");

        let err = ResultTable::new().write_csv(&path).expect_err("empty table");
        assert!(matches!(err, Error::NoResults));
        assert!(!path.exists());

        fs::remove_dir_all(&dir).expect("cleanup temp dir");
    }
}
