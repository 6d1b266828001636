use meter_delta_builder::{
    process_meter_readings, records_to_csv, EngineConfig, ImportTemplate, MeterIdentityResolver,
    Period, SourceTable,
};

const SOLAR_SHEET: &str = "\
Date,JAFZA 1-Meter 1,JAFZA 4,AFR,CGF
01/31/2024,15200,8800,4100,2900
02/01/2024,15262,8841,4128,
02/02/2024,15330,8879,4150,2951
02/03/2024,15391,8930,4177,2980
";

const TEMPLATE: &str = "\
Time,Reference Meter,Solar Energy Meter Reading
01/02/2024 23:59:00,JAFZA 1-Meter 1,
01/02/2024 23:59:00,JAFZA 4-Meter 1,
02/02/2024 23:59:00,DWC-AFR-Meter 2,
02/02/2024 23:59:00,DWC-CGF-Meter 1,
";

fn main() {
    let config = EngineConfig::from_json(
        r#"{
            "date_format": "MonthFirst",
            "date_sample": "01/31/2024",
            "meters": ["JAFZA 1-Meter 1", "JAFZA 4", "AFR", "CGF"],
            "mapping": {
                "JAFZA 1-Meter 1": "JAFZA 1-Meter 1",
                "JAFZA 4": "JAFZA 4-Meter 1",
                "AFR": "DWC-AFR-Meter 2",
                "CGF": "DWC-CGF-Meter 1"
            }
        }"#,
    )
    .expect("config should parse");

    let table = SourceTable::from_csv_reader(SOLAR_SHEET.as_bytes()).expect("sheet should parse");
    let period = Period::new(2, 2024).expect("valid period");
    let report = process_meter_readings(&config, &table, period).expect("run should succeed");

    println!("Deltas for {} (anchor {}):", period, period.anchor_day());
    print!("{}", records_to_csv(&report.records).expect("csv export"));

    println!("\nDiagnostics:");
    for (kind, count) in report.summary() {
        println!(" - {}: {}", kind, count);
    }
    for event in report.missing_data().take(5) {
        println!("   {} {}: {}", event.date, event.meter, event.reason);
    }

    let resolver = MeterIdentityResolver::new(&config.mapping, config.unmapped_policy)
        .expect("mapping should be consistent");
    let template = ImportTemplate::from_csv_reader(TEMPLATE.as_bytes(), &Default::default())
        .expect("template should parse");
    let fill = template.fill(&report.records, &resolver, &config.meters);

    println!("\nFilled template ({} rows written):", fill.filled);
    print!("{}", fill.template.to_csv().expect("csv export"));
}
