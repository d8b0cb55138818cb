use sheet_explorer::error::AppError;
use sheet_explorer::models::{Column, Table, Value};
use sheet_explorer::services::aggregate::{aggregate, AggMode, KEY_COLUMN, VALUE_COLUMN};
use sheet_explorer::services::chart::{self, ChartData};
use sheet_explorer::services::cleaner::clean;
use sheet_explorer::services::inference::classify;
use sheet_explorer::services::reader::{self, csv};
use sheet_explorer::services::stats::summarize;
use sheet_explorer::services::time_aggregate::{aggregate_by_time, Frequency};

fn cidades() -> Table {
    Table::new(vec![
        Column::new(
            "cidade",
            vec![Value::text("São Paulo"), Value::text("Belém"), Value::text("Recife")],
        ),
        Column::new(
            "pop",
            vec![Value::Integer(12_300_000), Value::Integer(1_500_000), Value::Integer(1_650_000)],
        ),
    ])
    .unwrap()
}

fn as_csv_text(table: &Table, separator: u8) -> String {
    let sep = (separator as char).to_string();
    let mut text = table.column_names().join(&sep);
    text.push('\n');
    for row in 0..table.height() {
        let cells: Vec<String> = table.row(row).iter().map(|v| v.to_string()).collect();
        text.push_str(&cells.join(&sep));
        text.push('\n');
    }
    text
}

#[test]
fn csv_round_trips_for_every_strategy() {
    let table = cidades();
    for strategy in csv::strategies() {
        let bytes = strategy
            .encoding
            .encode(&as_csv_text(&table, strategy.separator))
            .unwrap();
        let back = reader::read(&bytes, "cidades.csv")
            .unwrap_or_else(|e| panic!("{} failed: {}", strategy.describe(), e));
        assert_eq!(back, table, "{}", strategy.describe());
    }
}

#[test]
fn clean_is_idempotent_on_loaded_files() {
    let raw = reader::read(b"Unnamed: 0,nome, idade \n0,ana,30\n1,bia,\n", "export.csv").unwrap();
    let once = clean(raw);
    assert_eq!(once.column_names(), vec!["nome", "idade"]);
    assert_eq!(clean(once.clone()), once);
}

#[test]
fn classify_partitions_columns() {
    let loaded = reader::read(
        b"[{\"a\":1,\"b\":\"x\",\"c\":true,\"d\":1.5},{\"a\":2,\"b\":null,\"c\":false,\"d\":null}]",
        "rows.json",
    )
    .unwrap();
    let classes = classify(&loaded);
    let mut all: Vec<String> = classes.numeric.iter().chain(&classes.text).cloned().collect();
    all.sort();
    assert_eq!(all, vec!["a", "b", "c", "d"]);
    assert!(classes.numeric.iter().all(|n| !classes.text.contains(n)));
}

#[test]
fn counts_add_up_to_row_total() {
    let table = reader::read(b"uf,v\nBA,1\nPE,2\nBA,3\n,4\nBA,5\n", "uf.csv").unwrap();
    let counts = aggregate(&table, "uf", None, AggMode::Count).unwrap();
    let per_key: Vec<(String, Value)> = counts
        .column(KEY_COLUMN)
        .unwrap()
        .values
        .iter()
        .map(Value::to_string)
        .zip(counts.column(VALUE_COLUMN).unwrap().values.iter().cloned())
        .collect();
    assert_eq!(
        per_key,
        vec![
            ("BA".to_string(), Value::Integer(3)),
            ("PE".to_string(), Value::Integer(1)),
            ("null".to_string(), Value::Integer(1)),
        ]
    );
    let total: f64 = counts
        .column(VALUE_COLUMN)
        .unwrap()
        .values
        .iter()
        .filter_map(Value::as_f64)
        .sum();
    assert_eq!(total as usize, table.height());
}

#[test]
fn time_buckets_sorted_for_any_row_order() {
    let table = reader::read(
        b"data,total\n2024-03-05,1\n2024-01-10,2\n2024-02-20,3\n2024-01-02,4\n2023-12-31,5\n",
        "vendas.csv",
    )
    .unwrap();
    let n = table.height();
    let orders: Vec<Vec<usize>> = vec![
        (0..n).collect(),
        (0..n).rev().collect(),
        (0..n).map(|i| (i + 2) % n).collect(),
    ];
    for order in orders {
        let shuffled = table.take_rows(&order);
        let out = aggregate_by_time(&shuffled, "data", Some("total"), AggMode::Sum, Frequency::Month)
            .unwrap();
        let keys = &out.column(KEY_COLUMN).unwrap().values;
        assert_eq!(keys.len(), 4);
        assert!(keys.windows(2).all(|w| w[0].as_datetime() < w[1].as_datetime()));
    }
}

// Months without rows are omitted rather than zero-filled.
#[test]
fn time_buckets_skip_empty_periods() {
    let table = reader::read(b"data,total\n2024-01-10,1\n2024-04-10,2\n", "gap.csv").unwrap();
    let out = aggregate_by_time(&table, "data", Some("total"), AggMode::Sum, Frequency::Month).unwrap();
    assert_eq!(out.height(), 2);
}

#[test]
fn summary_of_empty_table() {
    let table = reader::read(b"a,b\n", "vazio.csv").unwrap();
    let report = summarize(&table);
    assert_eq!(report.shape, (0, 2));
    assert_eq!(report.nulls_total, 0);
    assert_eq!(report.duplicates, 0);
    assert!(report.describe_num.is_none());
}

#[test]
fn ndjson_counts_per_value() {
    let table = reader::read(b"{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n", "linhas.json").unwrap();
    assert_eq!(table.shape(), (3, 1));
    assert_eq!(
        table.column("a").unwrap().values,
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
    );
    let counts = aggregate(&table, "a", None, AggMode::Count).unwrap();
    assert_eq!(counts.height(), 3);
    assert!(counts
        .column(VALUE_COLUMN)
        .unwrap()
        .values
        .iter()
        .all(|v| *v == Value::Integer(1)));
}

#[test]
fn semicolon_csv_sums_in_encounter_order() {
    let table = reader::read(b"id;val\n1;10\n2;20\n1;30\n", "ids.csv").unwrap();
    assert_eq!(table.shape(), (3, 2));
    let sums = aggregate(&table, "id", Some("val"), AggMode::Sum).unwrap();
    assert_eq!(
        sums.column(KEY_COLUMN).unwrap().values,
        vec![Value::Integer(1), Value::Integer(2)]
    );
    assert_eq!(
        sums.column(VALUE_COLUMN).unwrap().values,
        vec![Value::Integer(40), Value::Integer(20)]
    );
}

#[test]
fn scatter_without_y_is_rejected() {
    let table = Table::new(vec![Column::new("a", vec![Value::Integer(1)])]).unwrap();
    let err = chart::build("Scatter", &table, "a", None, None, false).unwrap_err();
    assert!(matches!(err, AppError::InvalidChartRequest(_)));
}

#[test]
fn pie_slices_follow_aggregated_values() {
    let result = Table::new(vec![
        Column::new(KEY_COLUMN, vec![Value::text("A"), Value::text("B")]),
        Column::new(VALUE_COLUMN, vec![Value::Integer(3), Value::Integer(7)]),
    ])
    .unwrap();
    let spec = chart::build("Pizza", &result, KEY_COLUMN, Some(VALUE_COLUMN), None, true).unwrap();
    let ChartData::Slices { slices, .. } = spec.data else {
        panic!("pie charts produce slices");
    };
    let sizes: Vec<(String, f64)> = slices.iter().map(|s| (s.label.to_string(), s.value)).collect();
    assert_eq!(sizes, vec![("A".to_string(), 3.0), ("B".to_string(), 7.0)]);
    assert_eq!(sizes.iter().map(|(_, v)| v).sum::<f64>(), 10.0);
}
