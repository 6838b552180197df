use std::path::Path;

use log::info;

use crate::data::osm::Element;
use crate::data::ShapedElement;
use crate::errors::Result;
use crate::normalize::StreetMapping;
use crate::UserConfig;

use super::parse_osm::open_osm_reader;
use super::shape::{Extractor, FIXME_PREFIX};
use super::validate::{validation_error, Schema, SchemaValidator, Validator};
use super::write_tables::Tables;
use super::Etl;

pub const ETL_NAME: &str = "wrangle";

pub type ElementStream = Box<dyn Iterator<Item = Result<Element>>>;

/// One shaped element plus the number of its tags dropped for problem characters.
pub struct Shaped {
    pub record: ShapedElement,
    pub dropped_tags: usize,
}

/// Lazily shapes (and optionally validates) elements as they are pulled.
/// Stops after the first error.
pub struct ShapedStream {
    elements: ElementStream,
    extractor: Extractor,
    validation: Option<(Box<dyn Validator>, Schema)>,
    failed: bool,
}

impl ShapedStream {
    fn shape(&self, element: &Element) -> Result<Shaped> {
        let record = self.extractor.extract(element)?;
        if let Some((validator, schema)) = &self.validation {
            let errors = validator.validate(&record, schema);
            if !errors.is_empty() {
                return Err(validation_error(record.id(), &errors));
            }
        }
        let dropped_tags = element.tags.len() - record.tags().len();
        Ok(Shaped { record, dropped_tags })
    }
}

impl Iterator for ShapedStream {
    type Item = Result<Shaped>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.elements.next()?.and_then(|element| self.shape(&element));
        self.failed = result.is_err();
        Some(result)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub nodes: usize,
    pub ways: usize,
    pub node_tags: usize,
    pub way_tags: usize,
    pub way_nodes: usize,
    pub dropped_tags: usize,
    pub fixme_postcodes: usize,
}

impl RunSummary {
    fn record(&mut self, shaped: &Shaped) {
        match &shaped.record {
            ShapedElement::Node { tags, .. } => {
                self.nodes += 1;
                self.node_tags += tags.len();
            },
            ShapedElement::Way { nodes, tags, .. } => {
                self.ways += 1;
                self.way_tags += tags.len();
                self.way_nodes += nodes.len();
            },
        }
        self.dropped_tags += shaped.dropped_tags;
        self.fixme_postcodes += shaped.record.tags().iter()
            .filter(|tag| tag.key == "postcode" && tag.value.starts_with(FIXME_PREFIX))
            .count();
    }
}

/// Streams the OSM document named in the config into the five CSV tables.
pub struct WrangleEtl<'a> {
    config: &'a UserConfig,
    summary: RunSummary,
}

impl WrangleEtl<'_> {
    pub fn new(config: &UserConfig) -> WrangleEtl {
        WrangleEtl {
            config,
            summary: RunSummary::default(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    fn load_schema(&self) -> Result<Schema> {
        match &self.config.schema_path {
            Some(path) => Schema::from_path(Path::new(path)),
            None => Schema::builtin(),
        }
    }
}

impl Etl for WrangleEtl<'_> {
    type Input = ElementStream;
    type Output = ShapedStream;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn extract(&mut self) -> Result<Self::Input> {
        let reader = open_osm_reader(Path::new(&self.config.data_path))?;
        if self.config.progress {
            Ok(Box::new(tqdm::tqdm(reader)))
        } else {
            Ok(Box::new(reader))
        }
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let mapping = self.config.street_abbreviations.clone()
            .map(StreetMapping::new)
            .unwrap_or_default();
        let validation = if self.config.validate {
            let validator: Box<dyn Validator> = Box::new(SchemaValidator);
            Some((validator, self.load_schema()?))
        } else {
            None
        };

        Ok(ShapedStream {
            elements: input,
            extractor: Extractor::new(mapping, self.config.compat),
            validation,
            failed: false,
        })
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let mut tables = Tables::create(dir)?;
        self.summary = RunSummary::default();

        for shaped in output {
            let shaped = shaped?;
            tables.write(&shaped.record)?;
            self.summary.record(&shaped);
        }
        tables.flush()?;

        let summary = self.summary;
        info!(
            etl_name = ETL_NAME,
            nodes = summary.nodes,
            ways = summary.ways,
            node_tags = summary.node_tags,
            way_tags = summary.way_tags,
            way_nodes = summary.way_nodes,
            dropped_tags = summary.dropped_tags,
            fixme_postcodes = summary.fixme_postcodes;
            "Wrote tables"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;
    use std::path::PathBuf;

    use csv::ReaderBuilder;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::errors::ErrorKind;
    use crate::normalize::Compatibility;

    const NODE_ATTRS: &str =
        r#"lat="47.1" lon="-122.3" user="u" uid="2" version="1" changeset="3" timestamp="t""#;
    const WAY_ATTRS: &str = r#"user="u" uid="2" version="1" changeset="3" timestamp="t""#;

    fn config(data_path: &Path, dest_path: &Path) -> UserConfig {
        UserConfig {
            data_path: data_path.display().to_string(),
            dest_path: dest_path.display().to_string(),
            validate: true,
            schema_path: None,
            compat: Compatibility::default(),
            street_abbreviations: None,
            log_level: "info".to_string(),
            progress: false,
        }
    }

    fn write_osm(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("sample.osm");
        fs::write(&path, format!(
            "<?xml version='1.0' encoding='UTF-8'?>\n<osm version=\"0.6\">\n{}\n</osm>\n", body
        )).unwrap();
        path
    }

    fn read_rows(dir: &Path, file_name: &str) -> Vec<Vec<String>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_path(dir.join(file_name))
            .unwrap();
        reader
            .records()
            .map(|row| row.unwrap().iter().map(|value| value.to_string()).collect())
            .collect()
    }

    fn run(config: &UserConfig) -> Result<RunSummary> {
        let mut etl = WrangleEtl::new(config);
        etl.process(Path::new(&config.dest_path))?;
        Ok(etl.summary())
    }

    #[test]
    fn node_with_postcode_end_to_end() {
        let dir = tempdir().unwrap();
        let input = write_osm(&dir, &format!(
            r#"<node id="1" {}><tag k="addr:postcode" v="98199"/></node>"#, NODE_ATTRS
        ));
        let out = dir.path().join("csv");
        run(&config(&input, &out)).unwrap();

        let nodes = read_rows(&out, "nodes.csv");
        assert_eq!(nodes, vec![
            vec!["id", "lat", "lon", "user", "uid", "version", "changeset", "timestamp"],
            vec!["1", "47.1", "-122.3", "u", "2", "1", "3", "t"],
        ]);
        let tags = read_rows(&out, "nodes_tags.csv");
        assert_eq!(tags, vec![
            vec!["id", "key", "value", "type"],
            vec!["1", "postcode", "98199", "addr"],
        ]);
    }

    #[test]
    fn short_postcode_is_marked_fixme() {
        let dir = tempdir().unwrap();
        let input = write_osm(&dir, &format!(
            r#"<node id="1" {}><tag k="addr:postcode" v="9819"/></node>"#, NODE_ATTRS
        ));
        let out = dir.path().join("csv");
        let summary = run(&config(&input, &out)).unwrap();

        let tags = read_rows(&out, "nodes_tags.csv");
        assert_eq!(tags[1], vec!["1", "postcode", "fixme:9819", "addr"]);
        assert_eq!(summary.fixme_postcodes, 1);
    }

    #[test]
    fn ways_relations_and_dropped_tags() {
        let dir = tempdir().unwrap();
        let input = write_osm(&dir, &format!(
            r#"<node id="1" {node}/>
            <node id="2" {node}/>
            <way id="10" {way}>
              <nd ref="1"/><nd ref="2"/><nd ref="1"/>
              <tag k="addr:street" v="Main St"/>
              <tag k="bad key" v="x"/>
              <tag k="addr:city" v="seattle, WA"/>
            </way>
            <relation id="20" {way}><member type="way" ref="10" role=""/><tag k="type" v="route"/></relation>"#,
            node = NODE_ATTRS, way = WAY_ATTRS
        ));
        let out = dir.path().join("csv");
        let summary = run(&config(&input, &out)).unwrap();

        assert_eq!(summary, RunSummary {
            nodes: 2,
            ways: 1,
            node_tags: 0,
            way_tags: 2,
            way_nodes: 3,
            dropped_tags: 1,
            fixme_postcodes: 0,
        });
        assert_eq!(read_rows(&out, "ways.csv")[1], vec!["10", "u", "2", "1", "3", "t"]);
        assert_eq!(&read_rows(&out, "ways_nodes.csv")[1..], &[
            vec!["10", "1", "0"],
            vec!["10", "2", "1"],
            vec!["10", "1", "2"],
        ]);
        assert_eq!(&read_rows(&out, "ways_tags.csv")[1..], &[
            vec!["10", "street", "Main Street", "addr"],
            vec!["10", "city", "Seattle", "addr"],
        ]);
    }

    #[test]
    fn missing_attribute_aborts_the_run() {
        let dir = tempdir().unwrap();
        let input = write_osm(&dir, &format!(
            r#"<node id="1" {node}/>
            <node id="2" lat="1" lon="1" user="u" version="1" changeset="3" timestamp="t"/>
            <node id="3" {node}/>"#,
            node = NODE_ATTRS
        ));
        let out = dir.path().join("csv");
        let err = run(&config(&input, &out)).unwrap_err();

        assert_eq!(err.kind, ErrorKind::MissingAttribute);
        assert_eq!(err.message, r#"<node id="2"> is missing required attribute 'uid'"#);
        let ids: Vec<String> = read_rows(&out, "nodes.csv").into_iter().skip(1).map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn validation_failure_is_fatal_only_when_enabled() {
        let dir = tempdir().unwrap();
        let input = write_osm(&dir, &format!(
            r#"<node id="1" {node}/>
            <node id="2" lat="north" lon="1" user="u" uid="2" version="1" changeset="3" timestamp="t"/>
            <node id="3" {node}/>"#,
            node = NODE_ATTRS
        ));
        let out = dir.path().join("csv");
        let mut config = config(&input, &out);

        let err = run(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("Element of type 'node' has the following errors:"));
        assert!(err.message.contains("element 2 failed validation"));
        assert!(err.message.contains("\n  lat: \"north\""));
        assert_eq!(read_rows(&out, "nodes.csv").len(), 2);

        config.validate = false;
        let summary = run(&config).unwrap();
        assert_eq!(summary.nodes, 3);
        assert_eq!(read_rows(&out, "nodes.csv").len(), 4);
    }

    #[test]
    fn malformed_input_keeps_headers() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("broken.osm");
        fs::write(&input, format!(r#"<osm><node id="1" {}><tag k="a" v="b"/></way></osm>"#, NODE_ATTRS)).unwrap();
        let out = dir.path().join("csv");

        let err = run(&config(&input, &out)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedInput);
        assert_eq!(read_rows(&out, "nodes.csv").len(), 1);
        assert_eq!(read_rows(&out, "ways_tags.csv").len(), 1);
    }

    #[test]
    fn missing_input_creates_no_tables() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("csv");
        let err = run(&config(&dir.path().join("absent.osm"), &out)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
        assert!(!out.join("nodes.csv").exists());
    }

    #[test]
    fn legacy_compat_reproduces_historical_output() {
        let dir = tempdir().unwrap();
        let input = write_osm(&dir, &format!(
            r#"<node id="1" {node}>
              <tag k="addr:city" v="WALLA WALLA"/>
              <tag k="name" v="Corner St"/>
            </node>
            <way id="10" {way}>
              <nd ref="1"/>
              <tag k="addr:city" v="WALLA WALLA"/>
              <tag k="name" v="Corner St"/>
            </way>"#,
            node = NODE_ATTRS, way = WAY_ATTRS
        ));
        let out = dir.path().join("csv");
        let mut config = config(&input, &out);
        let tag_values = |file_name: &str| -> Vec<String> {
            read_rows(&out, file_name).into_iter().skip(1).map(|r| r[2].clone()).collect()
        };

        run(&config).unwrap();
        assert_eq!(tag_values("nodes_tags.csv"), vec!["Walla Walla", "Corner St"]);
        assert_eq!(tag_values("ways_tags.csv"), vec!["Walla Walla", "Corner St"]);

        config.compat = Compatibility { legacy_city_suffix: true, legacy_street_scope: true };
        run(&config).unwrap();
        assert_eq!(tag_values("nodes_tags.csv"), vec!["Walla Wall", "Corner Street"]);
        assert_eq!(tag_values("ways_tags.csv"), vec!["Walla Wall", "Corner Street"]);
    }

    #[test]
    fn progress_bar_does_not_change_output() {
        let dir = tempdir().unwrap();
        let input = write_osm(&dir, &format!(
            r#"<node id="1" {node}><tag k="addr:street" v="Main St"/></node>
            <way id="10" {way}><nd ref="1"/></way>"#,
            node = NODE_ATTRS, way = WAY_ATTRS
        ));
        let out = dir.path().join("csv");
        let mut config = config(&input, &out);
        config.progress = true;

        let summary = run(&config).unwrap();
        assert_eq!(summary.nodes, 1);
        assert_eq!(summary.ways, 1);
        assert_eq!(read_rows(&out, "nodes_tags.csv")[1], vec!["1", "street", "Main Street", "addr"]);
        assert_eq!(read_rows(&out, "ways_nodes.csv")[1], vec!["10", "1", "0"]);
    }

    #[test]
    fn custom_abbreviations_and_schema_file() {
        let dir = tempdir().unwrap();
        let input = write_osm(&dir, &format!(
            r#"<node id="1" {}><tag k="addr:street" v="Sunset Blvd"/></node>"#, NODE_ATTRS
        ));
        let schema_path = dir.path().join("schema.json");
        fs::write(&schema_path, r#"{
            "node": {"type": "object", "properties": {"id": {"type": "string"}}, "additionalProperties": false},
            "node_tags": {}
        }"#).unwrap();
        let out = dir.path().join("csv");
        let mut config = config(&input, &out);
        config.street_abbreviations = Some(
            [("Blvd".to_string(), "Boulevard".to_string())].into_iter().collect()
        );

        config.validate = false;
        run(&config).unwrap();
        assert_eq!(read_rows(&out, "nodes_tags.csv")[1][2], "Sunset Boulevard");

        config.validate = true;
        config.schema_path = Some(schema_path.display().to_string());
        let err = run(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("Element of type 'node' has the following errors:"));
        assert!(err.message.contains("'lat'"));
        assert!(!err.message.contains("node_tags"));
    }

    #[test]
    fn xz_compressed_input_is_decompressed() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("sample.osm.xz");
        let xml = format!(r#"<osm><node id="7" {}/></osm>"#, NODE_ATTRS);
        let mut encoder = xz::write::XzEncoder::new(fs::File::create(&input).unwrap(), 6);
        encoder.write_all(xml.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let out = dir.path().join("csv");
        run(&config(&input, &out)).unwrap();
        assert_eq!(read_rows(&out, "nodes.csv")[1][0], "7");
    }
}
