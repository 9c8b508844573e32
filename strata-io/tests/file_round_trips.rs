use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray};
use arrow::datatypes::{Float64Type, Int64Type};
use strata_expr::ge;
use strata_io::{
    CsvReadOptions, CsvWriteOptions, ExtensionCodec, ReadOptions, WriterConfig, read_csv,
    read_ipc, read_ipc_mmap, read_ipc_mmap_with_codec, read_parquet, read_parquet_with_codec,
    write_csv, write_ipc, write_ipc_with_codec, write_parquet, write_parquet_with_codec,
};
use strata_result::{Error, Result};
use strata_table::{Attribute, AttributeValue, Column, SchemaBuilder, Table, TableSchema};
use strata_test_utils::{ScratchDir, init_tracing_for_tests};

struct Fixture {
    point: Arc<TableSchema>,
    track: Arc<TableSchema>,
}

fn fixture() -> Fixture {
    let point = SchemaBuilder::new("Point")
        .column(Column::float64("x"))
        .column(Column::float64("y").nullable(true))
        .attribute(Attribute::string("frame").with_default("world"))
        .build()
        .unwrap();
    let track = SchemaBuilder::new("Track")
        .column(Column::int64("id"))
        .column(Column::utf8("label").nullable(true))
        .column(point.as_column("pos"))
        .attribute(Attribute::float("rate"))
        .build()
        .unwrap();
    Fixture { point, track }
}

fn sample(f: &Fixture) -> Table {
    let pos = f
        .point
        .builder()
        .column("x", vec![0.5, 1.5, 2.5, 3.5])
        .column("y", vec![Some(1.0), None, Some(3.0), None])
        .attribute("frame", "body")
        .finish()
        .unwrap();
    f.track
        .builder()
        .column("id", vec![10i64, 11, 12, 13])
        .column("label", vec![Some("a"), None, Some("c"), Some("d")])
        .column("pos", &pos)
        .attribute("rate", 2.5)
        .finish()
        .unwrap()
}

fn assert_same(back: &Table, original: &Table) {
    assert_eq!(**back.schema(), **original.schema());
    assert_eq!(back, original);
    assert_eq!(back.attribute("rate").unwrap(), AttributeValue::Float(2.5));
    assert_eq!(
        back.attribute("pos.frame").unwrap(),
        AttributeValue::from("body")
    );
}

#[test]
fn nested_tables_round_trip_through_every_format() {
    init_tracing_for_tests();
    let f = fixture();
    let table = sample(&f);
    let dir = ScratchDir::new();
    let options = ReadOptions::default();

    let parquet = dir.path("track.parquet");
    write_parquet(&table, &parquet, &WriterConfig::default()).unwrap();
    assert_same(&read_parquet(&f.track, &parquet, &options).unwrap(), &table);

    let ipc = dir.path("track.arrow");
    write_ipc(&table, &ipc).unwrap();
    assert_same(&read_ipc(&f.track, &ipc, &options).unwrap(), &table);
    assert_same(&read_ipc_mmap(&f.track, &ipc, &options).unwrap(), &table);

    let csv = dir.path("track.csv");
    write_csv(&table, &csv, &CsvWriteOptions::default()).unwrap();
    let header = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(
        header.lines().next(),
        Some("id,label,pos.x,pos.y,rate,pos.frame")
    );
    assert_same(
        &read_csv(&f.track, &csv, &CsvReadOptions::default()).unwrap(),
        &table,
    );
}

#[test]
fn empty_tables_round_trip() {
    let f = fixture();
    let empty = Table::empty(&f.track);
    let dir = ScratchDir::new();
    let parquet = dir.path("empty.parquet");
    write_parquet(&empty, &parquet, &WriterConfig::default()).unwrap();
    let back = read_parquet(&f.track, &parquet, &ReadOptions::default()).unwrap();
    assert_eq!(back.num_rows(), 0);
    assert!(back.is_schema_compatible(&empty));

    let ipc = dir.path("empty.arrow");
    write_ipc(&empty, &ipc).unwrap();
    let back = read_ipc_mmap(&f.track, &ipc, &ReadOptions::default()).unwrap();
    assert_eq!(back.num_rows(), 0);
}

#[test]
fn mapped_columns_outlive_the_file() {
    let f = fixture();
    let table = sample(&f);
    let dir = ScratchDir::new();
    let path = dir.path("mapped.arrow");
    write_ipc(&table, &path).unwrap();

    let mapped = read_ipc_mmap(&f.track, &path, &ReadOptions::default()).unwrap();
    #[cfg(target_os = "linux")]
    {
        let (start, end) = mapped_range(&std::fs::canonicalize(&path).unwrap())
            .expect("file is mapped");
        let ids = mapped.column("id").unwrap().as_primitive::<Int64Type>();
        let xs = mapped.column_path("pos.x").unwrap();
        let xs = xs.as_primitive::<Float64Type>();
        for ptr in [ids.values().as_ptr() as usize, xs.values().as_ptr() as usize] {
            assert!((start..end).contains(&ptr), "{ptr:#x} outside {start:#x}-{end:#x}");
        }
    }
    std::fs::remove_file(&path).unwrap();
    assert!(!Path::new(&path).exists());

    let derived = mapped.slice(1, 2).unwrap();
    drop(mapped);
    let ids = derived.column("id").unwrap().as_primitive::<Int64Type>();
    assert_eq!(ids.values().as_ref(), &[11, 12]);
    let xs = derived
        .column_path("pos.x")
        .unwrap()
        .as_primitive::<Float64Type>()
        .values()
        .to_vec();
    assert_eq!(xs, vec![1.5, 2.5]);
}

/// Address range of the mapping of `path` in this process.
#[cfg(target_os = "linux")]
fn mapped_range(path: &Path) -> Option<(usize, usize)> {
    let maps = std::fs::read_to_string("/proc/self/maps").ok()?;
    let path = path.to_str()?;
    let line = maps.lines().find(|line| line.ends_with(path))?;
    let (range, _) = line.split_once(' ')?;
    let (start, end) = range.split_once('-')?;
    Some((
        usize::from_str_radix(start, 16).ok()?,
        usize::from_str_radix(end, 16).ok()?,
    ))
}

#[test]
fn structural_differences_are_rejected_on_read() {
    let f = fixture();
    let table = sample(&f);
    let dir = ScratchDir::new();
    let parquet = dir.path("track.parquet");
    let ipc = dir.path("track.arrow");
    write_parquet(&table, &parquet, &WriterConfig::default()).unwrap();
    write_ipc(&table, &ipc).unwrap();

    let retyped = SchemaBuilder::new("Track")
        .column(Column::int32("id"))
        .build()
        .unwrap();
    let tightened = SchemaBuilder::new("Track")
        .column(Column::utf8("label"))
        .build()
        .unwrap();
    let missing = SchemaBuilder::new("Track")
        .column(Column::int64("serial"))
        .build()
        .unwrap();

    let options = ReadOptions::default();
    for schema in [&retyped, &tightened, &missing] {
        for result in [
            read_parquet(schema, &parquet, &options),
            read_ipc(schema, &ipc, &options),
            read_ipc_mmap(schema, &ipc, &options),
        ] {
            let err = result.unwrap_err();
            assert!(matches!(err, Error::SchemaMismatch(_)), "{err}");
        }
    }
}

#[test]
fn reads_keep_only_the_declared_columns() {
    let f = fixture();
    let table = sample(&f);
    let dir = ScratchDir::new();
    let parquet = dir.path("wide.parquet");
    let ipc = dir.path("wide.arrow");
    write_parquet(&table, &parquet, &WriterConfig::default()).unwrap();
    write_ipc(&table, &ipc).unwrap();

    let narrow = SchemaBuilder::new("Ids")
        .column(Column::int64("id"))
        .build()
        .unwrap();
    for back in [
        read_parquet(&narrow, &parquet, &ReadOptions::default()).unwrap(),
        read_ipc(&narrow, &ipc, &ReadOptions::default()).unwrap(),
    ] {
        assert_eq!(back.num_columns(), 1);
        assert_eq!(back.num_rows(), 4);
    }
}

#[test]
fn validators_run_on_read_unless_disabled() {
    let f = fixture();
    let table = sample(&f);
    let dir = ScratchDir::new();
    let path = dir.path("strict.parquet");
    write_parquet(&table, &path, &WriterConfig::default()).unwrap();

    let strict = SchemaBuilder::new("Ids")
        .column(Column::int64("id").with_validator(ge(12)))
        .build()
        .unwrap();
    let err = read_parquet(&strict, &path, &ReadOptions::default()).unwrap_err();
    let report = err.validation_report().expect("validation error");
    assert_eq!(report.for_column("id").next().unwrap().rows, vec![0, 1]);

    let lenient = ReadOptions::default().with_validate(false);
    assert_eq!(read_parquet(&strict, &path, &lenient).unwrap().num_rows(), 4);
}

#[derive(Debug, Clone, PartialEq)]
struct Lineage {
    origin: String,
    rows: usize,
}

struct LineageCodec;

impl ExtensionCodec<Lineage> for LineageCodec {
    fn encode(&self, extension: &Lineage) -> Result<HashMap<String, String>> {
        Ok(HashMap::from([
            ("origin".to_string(), extension.origin.clone()),
            ("rows".to_string(), extension.rows.to_string()),
        ]))
    }

    fn decode(&self, metadata: &HashMap<String, String>) -> Result<Lineage> {
        let origin = metadata
            .get("origin")
            .cloned()
            .ok_or_else(|| Error::codec("missing origin"))?;
        let rows = metadata
            .get("rows")
            .ok_or_else(|| Error::codec("missing rows"))?
            .parse()
            .map_err(Error::codec)?;
        Ok(Lineage { origin, rows })
    }

    fn rebuild(&self) -> Option<strata_table::Rebuild<Lineage>> {
        Some(Arc::new(|prev: &Lineage, columns: &[ArrayRef]| Lineage {
            origin: prev.origin.clone(),
            rows: columns[0].len(),
        }))
    }
}

#[test]
fn extension_state_round_trips_through_a_codec() {
    let f = fixture();
    let table = sample(&f).with_extension(Lineage {
        origin: "survey".into(),
        rows: 4,
    });
    let dir = ScratchDir::new();
    let options = ReadOptions::default();

    let parquet = dir.path("lineage.parquet");
    write_parquet_with_codec(&table, &parquet, &WriterConfig::default(), &LineageCodec).unwrap();
    let back = read_parquet_with_codec(&f.track, &parquet, &options, &LineageCodec).unwrap();
    assert_eq!(back.extension(), table.extension());
    assert_eq!(back.slice(0, 3).unwrap().extension().rows, 3);

    let ipc = dir.path("lineage.arrow");
    write_ipc_with_codec(&table, &ipc, &LineageCodec).unwrap();
    let back = read_ipc_mmap_with_codec(&f.track, &ipc, &options, &LineageCodec).unwrap();
    assert_eq!(back.extension().origin, "survey");

    // Files written without a codec carry no extension keys.
    let plain = dir.path("plain.parquet");
    write_parquet(&table, &plain, &WriterConfig::default()).unwrap();
    let err = read_parquet_with_codec(&f.track, &plain, &options, &LineageCodec).unwrap_err();
    assert!(matches!(err, Error::Codec(_)), "{err}");
}
