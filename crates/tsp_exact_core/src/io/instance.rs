//! Reader and writer for coordinate-list TSP instances.
//!
//! ```text
//! NAME: tri3
//! DIMENSION: 3
//! NODE_COORD_SECTION
//! 1 0 0
//! 2 0 3
//! 3 4 0
//! EOF
//! ```

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{DistanceMatrix, Error, Point, Result};

const NODE_COORD_SECTION: &str = "NODE_COORD_SECTION";
const EOF_MARKER: &str = "EOF";
const TSPLIB_NODE_ID_BASE: usize = 1;
const MIN_DIMENSION: usize = 2;

/// A parsed instance: header fields plus one coordinate per node.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub name: String,
    pub comment_lines: Vec<String>,
    points: Vec<Point>,
}

impl Instance {
    pub fn new(name: impl Into<String>, points: Vec<Point>) -> Result<Self> {
        if points.len() < MIN_DIMENSION {
            return Err(Error::invalid_input(format!(
                "an instance needs at least {MIN_DIMENSION} nodes, got {}",
                points.len()
            )));
        }
        if let Some(idx) = points.iter().position(|p| !p.is_finite()) {
            return Err(Error::invalid_input(format!(
                "node {} has a non-finite coordinate",
                idx + TSPLIB_NODE_ID_BASE
            )));
        }
        Ok(Self {
            name: name.into(),
            comment_lines: Vec::new(),
            points,
        })
    }

    /// Reads and parses an instance file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let instance = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            Error::Parse(msg) => Error::parse(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        log::debug!(
            "parser.done: file={} name={} dimension={}",
            path.display(),
            instance.name,
            instance.dimension()
        );
        Ok(instance)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        Self::from_reader(text.as_bytes())
    }

    /// Parses line by line.
    ///
    /// Header keys are matched case-insensitively and may use `:` or `=`.
    /// Unknown keys and blank lines are skipped. Coordinate records are read
    /// until `DIMENSION` of them were seen or the `EOF` line, whichever comes
    /// first; anything after that is ignored.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut parser = InstanceParser::default();
        for (idx, line) in reader.lines().enumerate() {
            if parser.feed(idx + 1, &line?)? == Feed::Done {
                break;
            }
        }
        parser.finish()
    }

    pub fn dimension(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn distance_matrix(&self) -> DistanceMatrix {
        DistanceMatrix::from_points(&self.points)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "NAME: {}", self.name)?;
        for comment in &self.comment_lines {
            writeln!(f, "COMMENT: {comment}")?;
        }
        writeln!(f, "TYPE: TSP")?;
        writeln!(f, "DIMENSION: {}", self.dimension())?;
        writeln!(f, "EDGE_WEIGHT_TYPE: EUC_2D")?;
        writeln!(f, "{NODE_COORD_SECTION}")?;
        for (idx, point) in self.points.iter().enumerate() {
            writeln!(f, "{} {point}", idx + TSPLIB_NODE_ID_BASE)?;
        }
        writeln!(f, "{EOF_MARKER}")
    }
}

/// Reads an instance file and returns `(matrix, name, dimension)`.
pub fn parse(path: impl AsRef<Path>) -> Result<(DistanceMatrix, String, usize)> {
    let instance = Instance::from_file(path)?;
    let dimension = instance.dimension();
    Ok((instance.distance_matrix(), instance.name, dimension))
}

#[derive(Debug, Eq, PartialEq)]
enum Feed {
    More,
    Done,
}

#[derive(Default)]
struct InstanceParser {
    name: Option<String>,
    comment_lines: Vec<String>,
    dimension: Option<usize>,
    section_seen: bool,
    in_coords: bool,
    /// Records by node id. Nothing is sized from the header, so a huge
    /// `DIMENSION` costs only the records actually present.
    coords: BTreeMap<usize, Point>,
}

impl InstanceParser {
    fn feed(&mut self, line_no: usize, raw_line: &str) -> Result<Feed> {
        let line = raw_line.trim();
        if line.is_empty() {
            return Ok(Feed::More);
        }
        if line.eq_ignore_ascii_case(EOF_MARKER) {
            return Ok(Feed::Done);
        }
        if line.eq_ignore_ascii_case(NODE_COORD_SECTION) {
            self.begin_coords(line_no)?;
            return Ok(Feed::More);
        }

        if let Some((key, value)) = split_header(line) {
            match key.as_str() {
                "NAME" => self.name = Some(value.to_string()),
                "COMMENT" => self.comment_lines.push(value.to_string()),
                "DIMENSION" => self.set_dimension(line_no, value)?,
                _ => {}
            }
            return Ok(Feed::More);
        }

        if self.in_coords {
            self.coord_record(line_no, line)?;
            if Some(self.coords.len()) == self.dimension {
                self.in_coords = false;
            }
        }
        Ok(Feed::More)
    }

    fn set_dimension(&mut self, line_no: usize, value: &str) -> Result<()> {
        let dimension = value.parse::<usize>().map_err(|e| {
            Error::parse(format!("line {line_no}: bad DIMENSION value '{value}': {e}"))
        })?;
        if dimension < MIN_DIMENSION {
            return Err(Error::parse(format!(
                "line {line_no}: DIMENSION must be at least {MIN_DIMENSION}, got {dimension}"
            )));
        }
        if self.section_seen && self.dimension != Some(dimension) {
            return Err(Error::parse(format!(
                "line {line_no}: DIMENSION changed after {NODE_COORD_SECTION}"
            )));
        }
        self.dimension = Some(dimension);
        Ok(())
    }

    fn begin_coords(&mut self, line_no: usize) -> Result<()> {
        let Some(dimension) = self.dimension else {
            return Err(Error::parse(format!(
                "line {line_no}: {NODE_COORD_SECTION} before DIMENSION"
            )));
        };
        self.section_seen = true;
        self.in_coords = self.coords.len() < dimension;
        Ok(())
    }

    fn coord_record(&mut self, line_no: usize, line: &str) -> Result<()> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            return Ok(());
        }

        let id = tokens[0].parse::<usize>().map_err(|e| {
            Error::parse(format!("line {line_no}: bad node id '{}': {e}", tokens[0]))
        })?;
        let x = parse_coord(line_no, tokens[1])?;
        let y = parse_coord(line_no, tokens[2])?;

        let dimension = self.dimension.unwrap_or_default();
        if id < TSPLIB_NODE_ID_BASE || id > dimension {
            return Err(Error::parse(format!(
                "line {line_no}: node id {id} outside 1..={dimension}"
            )));
        }

        if self.coords.insert(id, Point::new(x, y)).is_some() {
            return Err(Error::parse(format!(
                "line {line_no}: duplicate node id {id}"
            )));
        }
        Ok(())
    }

    fn finish(self) -> Result<Instance> {
        let Some(dimension) = self.dimension else {
            return Err(Error::parse("missing DIMENSION"));
        };
        let Some(name) = self.name else {
            return Err(Error::parse("missing NAME"));
        };

        if !self.section_seen {
            return Err(Error::parse(format!(
                "missing {NODE_COORD_SECTION} for {dimension} nodes"
            )));
        }

        // Ids are unique and within range, so a short map has a gap.
        let read = self.coords.len();
        if read < dimension {
            let missing = (TSPLIB_NODE_ID_BASE..)
                .find(|id| !self.coords.contains_key(id))
                .unwrap_or(TSPLIB_NODE_ID_BASE + read);
            return Err(Error::parse(format!(
                "missing coordinates for node {missing} ({read} of {dimension} records read)"
            )));
        }

        Ok(Instance {
            name,
            comment_lines: self.comment_lines,
            points: self.coords.into_values().collect(),
        })
    }
}

/// `KEY: value`, `KEY : value` or `KEY = value`, key upper-cased.
fn split_header(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':').or_else(|| line.split_once('='))?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic() || c == '_') {
        return None;
    }
    Some((key.to_ascii_uppercase(), value.trim()))
}

fn parse_coord(line_no: usize, token: &str) -> Result<f64> {
    let value = token
        .parse::<f64>()
        .map_err(|e| Error::parse(format!("line {line_no}: bad coordinate '{token}': {e}")))?;
    if !value.is_finite() {
        return Err(Error::parse(format!(
            "line {line_no}: coordinate '{token}' is not finite"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::PathBuf,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::{Instance, parse};
    use crate::{Error, Point};

    const TRIANGLE: &str = "NAME: tri3\nDIMENSION: 3\nNODE_COORD_SECTION\n1 0 0\n2 0 3\n3 4 0\nEOF\n";

    fn unique_temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("tsp-exact-tests-{name}-{nanos}"))
    }

    fn parse_error(text: &str) -> String {
        match Instance::from_text(text).expect_err("parse should fail") {
            Error::Parse(msg) => msg,
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn parses_header_and_coordinates() {
        let instance = Instance::from_text(TRIANGLE).expect("parse triangle");
        assert_eq!(instance.name, "tri3");
        assert_eq!(instance.dimension(), 3);
        assert_eq!(instance.points()[1], Point::new(0.0, 3.0));

        let matrix = instance.distance_matrix();
        assert_eq!(matrix.get(0, 1), 3.0);
        assert_eq!(matrix.get(0, 2), 4.0);
        assert_eq!(matrix.get(1, 2), 5.0);
        assert!(matrix.is_symmetric());
        assert!(matrix.has_zero_diagonal());
    }

    #[test]
    fn accepts_tsplib_spacing_comments_and_unknown_keys_in_any_order() {
        let text = "\
DIMENSION : 4
COMMENT : four corners
TYPE : TSP

EDGE_WEIGHT_TYPE = EUC_2D
name = Square4
NODE_COORD_SECTION
  3 1.0 1.0
1 0 0
2 1e0 0.0
4 0 1
EOF
";
        let instance = Instance::from_text(text).expect("parse square");
        assert_eq!(instance.name, "Square4");
        assert_eq!(instance.comment_lines, vec!["four corners".to_string()]);
        assert_eq!(
            instance.points(),
            &[
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ]
        );
    }

    #[test]
    fn stops_after_dimension_records_and_ignores_extra_lines() {
        let text = "NAME: tri3\nDIMENSION: 3\nNODE_COORD_SECTION\n1 0 0\n2 0 3\n3 4 0\n4 9 9\n5 oops 1\n";
        let instance = Instance::from_text(text).expect("extra records are ignored");
        assert_eq!(instance.dimension(), 3);
    }

    #[test]
    fn ignores_short_coordinate_lines() {
        let text = "NAME: t\nDIMENSION: 2\nNODE_COORD_SECTION\n1 0\n1 0 0\n2 3 4\nEOF\n";
        let instance = Instance::from_text(text).expect("short lines are skipped");
        assert_eq!(instance.distance_matrix().get(0, 1), 5.0);
    }

    #[test]
    fn eof_before_dimension_records_is_an_error() {
        let msg = parse_error("NAME: tri3\nDIMENSION: 3\nNODE_COORD_SECTION\n1 0 0\n2 0 3\nEOF\n3 4 0\n");
        assert!(msg.contains("missing coordinates for node 3 (2 of 3 records read)"));
    }

    #[test]
    fn missing_or_bad_dimension_is_an_error() {
        assert!(parse_error("NAME: x\nEOF\n").contains("missing DIMENSION"));
        assert!(parse_error("NAME: x\nDIMENSION: three\n").contains("bad DIMENSION value 'three'"));
        assert!(parse_error("NAME: x\nDIMENSION: 1\n").contains("DIMENSION must be at least 2"));
        assert!(
            parse_error("NAME: x\nNODE_COORD_SECTION\n1 0 0\n")
                .contains("NODE_COORD_SECTION before DIMENSION")
        );
    }

    #[test]
    fn huge_dimension_fails_on_missing_records_without_allocating_for_them() {
        let msg = parse_error(
            "NAME: huge\nDIMENSION: 18446744073709551615\nNODE_COORD_SECTION\n1 0 0\nEOF\n",
        );
        assert!(msg.contains("missing coordinates for node 2 (1 of 18446744073709551615 records read)"));

        let msg = parse_error("NAME: huge\nDIMENSION: 18446744073709551615\nEOF\n");
        assert!(msg.contains("missing NODE_COORD_SECTION"));
    }

    #[test]
    fn header_values_keep_later_colons_and_eof_must_stand_alone() {
        let text = "NAME: a:b\nDIMENSION: 2\nNODE_COORD_SECTION\n1 0 0\n2 3 4\neof\n";
        assert_eq!(Instance::from_text(text).expect("parse").name, "a:b");

        // `EOF_MARKER` is not an end marker, so the missing record is reported.
        let msg = parse_error("NAME: x\nDIMENSION: 2\nNODE_COORD_SECTION\n1 0 0\nEOF_MARKER\n");
        assert!(msg.contains("missing coordinates for node 2"));
    }

    #[test]
    fn missing_name_is_an_error() {
        let msg = parse_error("DIMENSION: 2\nNODE_COORD_SECTION\n1 0 0\n2 1 1\nEOF\n");
        assert_eq!(msg, "missing NAME");
    }

    #[test]
    fn bad_records_are_errors() {
        let base = "NAME: x\nDIMENSION: 2\nNODE_COORD_SECTION\n";
        assert!(parse_error(&format!("{base}1 0 zero\n")).contains("line 4: bad coordinate 'zero'"));
        assert!(parse_error(&format!("{base}a 0 0\n")).contains("bad node id 'a'"));
        assert!(parse_error(&format!("{base}3 0 0\n")).contains("node id 3 outside 1..=2"));
        assert!(parse_error(&format!("{base}1 0 0\n1 2 2\n")).contains("duplicate node id 1"));
        assert!(parse_error(&format!("{base}1 inf 0\n")).contains("is not finite"));
        assert!(parse_error("NAME: x\nDIMENSION: 2\nEOF\n").contains("missing NODE_COORD_SECTION"));
    }

    #[test]
    fn display_round_trips_through_the_parser() {
        let mut instance = Instance::new(
            "grid",
            vec![Point::new(0.5, 1.0), Point::new(-2.0, 3.25), Point::new(7.0, 0.0)],
        )
        .expect("valid instance");
        instance.comment_lines.push("generated".to_string());

        let text = instance.to_string();
        assert!(text.starts_with("NAME: grid\nCOMMENT: generated\n"));
        assert!(text.contains("NODE_COORD_SECTION\n1 0.5 1.0\n2 -2.0 3.25\n3 7.0 0.0\nEOF\n"));
        assert_eq!(Instance::from_text(&text).expect("reparse"), instance);
    }

    #[test]
    fn new_rejects_single_node() {
        let err = Instance::new("one", vec![Point::new(0.0, 0.0)]).expect_err("one node");
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn parse_reads_file_and_reports_missing_file() {
        let dir = unique_temp_dir("instance-parse");
        fs::create_dir_all(&dir).expect("create temp dir");

        let path = dir.join("tri3.tsp");
        fs::write(&path, TRIANGLE).expect("write instance");
        let (matrix, name, dimension) = parse(&path).expect("parse file");
        assert_eq!(name, "tri3");
        assert_eq!(dimension, 3);
        assert_eq!(matrix.n(), 3);

        let err = parse(dir.join("missing.tsp")).expect_err("missing file");
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_parse());

        fs::write(&path, "NAME: bad\n").expect("write broken instance");
        let err = parse(&path).expect_err("broken file");
        assert!(err.to_string().contains("tri3.tsp: missing DIMENSION"));

        fs::remove_dir_all(&dir).expect("cleanup temp dir");
    }
}
