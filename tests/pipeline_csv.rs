//! Configuration file to report artifacts, through real weather files.

use std::f64::consts::PI;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use pv_yield::config::Config;
use pv_yield::pipeline::Pipeline;
use pv_yield::PipelineError;

/// One June day of 1-minute station data, local wall-clock timestamps.
fn write_station_day(path: &Path) {
    let mut csv = String::from("timestamp;g_hor_si;v_wind;t_Luft\n");
    for minute in 0..24 * 60 {
        let ghi = if (240..1200).contains(&minute) {
            800.0 * (PI * (minute - 240) as f64 / 960.0).sin()
        } else {
            0.0
        };
        writeln!(
            csv,
            "2015-06-21 {:02}:{:02}:00;{:.1};2,5;21.0",
            minute / 60,
            minute % 60,
            ghi
        )
        .unwrap();
    }
    fs::write(path, csv).unwrap();
}

/// Hourly re-analysis rows with components, spilling over from 2014.
fn write_reanalysis(path: &Path) {
    let mut csv = String::from("time,ghi,dni,dhi,wind_speed,temp_air\n");
    csv.push_str("2014-12-31T12:00:00Z,0,0,0,3.0,1.0\n");
    for hour in 0..24 {
        let (ghi, dni, dhi) = if (6..16).contains(&hour) {
            (400.0, 300.0, 150.0)
        } else {
            (0.0, 0.0, 0.0)
        };
        writeln!(csv, "2015-07-01T{hour:02}:00:00Z,{ghi},{dni},{dhi},3.0,24.0").unwrap();
    }
    fs::write(path, csv).unwrap();
}

fn config(dir: &Path, station: &Path, reanalysis: &Path) -> String {
    format!(
        r#"
[site]
name = "HTW Berlin"
latitude = 52.45544
longitude = 13.52481
timezone = "Europe/Berlin"

[simulation]
run_timeout_seconds = 120
failure_policy = "isolate"

[report]
output_dir = "{out}"

[[weather]]
name = "htw"
path = "{station}"
delimiter = ";"
[weather.columns]
time = "timestamp"
ghi = "g_hor_si"
wind_speed = "v_wind"
temp_air = "t_Luft"

[[weather]]
name = "fred"
path = "{reanalysis}"
year = 2015
[weather.columns]
time = "time"
ghi = "ghi"
wind_speed = "wind_speed"
temp_air = "temp_air"
dni = "dni"
dhi = "dhi"

[[arrays]]
name = "wr1"
surface_tilt = 14.57
surface_azimuth = 215.0
albedo = 0.2
module = "schott_asi_105"
inverter = "danfoss_dlx_2_9"
modules_per_string = 10
strings_per_inverter = 3
mounting = "close_mount"
losses = {{ soiling = 2.0, wiring = 2.0 }}

[[arrays]]
name = "wr4"
surface_tilt = 14.57
surface_azimuth = 215.0
albedo = 0.2
module = "aleo_s19_245"
inverter = "sma_sb_3000hf_30"
modules_per_string = 13
strings_per_inverter = 1
mounting = "close_mount"
"#,
        out = dir.join("results").display(),
        station = station.display(),
        reanalysis = reanalysis.display(),
    )
}

#[tokio::test]
async fn configured_sources_write_reports() {
    let dir = tempfile::tempdir().unwrap();
    let station = dir.path().join("station.csv");
    let reanalysis = dir.path().join("reanalysis.csv");
    write_station_day(&station);
    write_reanalysis(&reanalysis);

    let cfg = Config::from_toml_str(&config(dir.path(), &station, &reanalysis)).unwrap();
    let pipeline = Pipeline::from_config(&cfg).unwrap();
    let reports = pipeline.run_all().await.unwrap();

    assert_eq!(reports.len(), 2);
    let htw = &reports[0];
    assert_eq!(htw.report.source(), "htw");
    assert_eq!(htw.artifacts.len(), 3);
    assert!(htw.failures.is_empty());
    for artifact in &htw.artifacts {
        assert!(artifact.exists(), "{} missing", artifact.display());
    }

    let june_wr1 = htw.report.kwh("wr1", 6).unwrap();
    let june_wr4 = htw.report.kwh("wr4", 6).unwrap();
    assert!(june_wr1 > 5.0 && june_wr1 < 30.0, "wr1 June = {june_wr1}");
    assert!(june_wr4 > 5.0 && june_wr4 < 30.0, "wr4 June = {june_wr4}");
    // hourly means flatten the 800 W/m² peak slightly
    let max_ghi = htw.irradiation.max_ghi.unwrap();
    assert!(max_ghi > 780.0 && max_ghi <= 800.0, "max GHI = {max_ghi}");

    let table = fs::read_to_string(dir.path().join("results/results_monthly_htw.csv")).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 13);
    assert_eq!(lines[0], ";wr1;wr4");
    assert_eq!(lines[1], "January;0.0;0.0");
    assert!(lines[6].starts_with("June;"));

    // 2014 row dropped by the year filter, July only
    let fred = &reports[1];
    assert_eq!(fred.report.source(), "fred");
    assert!(fred.report.kwh("wr1", 7).unwrap() > 0.0);
    assert_eq!(fred.report.kwh("wr1", 12), Some(0.0));
    assert!(dir.path().join("results/results_monthly_fred.svg").exists());
}

#[tokio::test]
async fn missing_column_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let station = dir.path().join("station.csv");
    let reanalysis = dir.path().join("reanalysis.csv");
    fs::write(&station, "timestamp;ghi;v_wind;t_Luft\n2015-06-21 12:00:00;500;1;20\n").unwrap();
    write_reanalysis(&reanalysis);

    let cfg = Config::from_toml_str(&config(dir.path(), &station, &reanalysis)).unwrap();
    let err = Pipeline::from_config(&cfg).unwrap().run_all().await.unwrap_err();

    assert!(err.is_input_error());
    assert!(matches!(err, PipelineError::Schema { ref column, .. } if column == "g_hor_si"));
    assert!(!dir.path().join("results").exists());
}
