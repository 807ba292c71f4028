//! Executor tests against stand-in `autopkg` / `makecatalogs` shell scripts.
#![cfg(unix)]

use autopkgd::engine::{
    Autopkg, CatalogRebuilder, MakeCatalogs, RecipeExecutor, RecipeTool, run_with_timeout,
};
use autopkgd::pipeline::{Coordinator, RebuildOutcome};
use autopkgd::{Config, RowExt};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

const FAKE_AUTOPKG: &str = r#"#!/bin/sh
cmd="$1"; shift
if [ "$cmd" = "info" ]; then
  case "$1" in
    Missing*) echo "No valid recipe found for $1" >&2; exit 1 ;;
  esac
  echo "Description: fake info for $1"
  exit 0
fi
report=""
recipe=""
for arg in "$@"; do
  case "$arg" in
    --report-plist=*) report="${arg#--report-plist=}" ;;
    --check) echo "check mode" ;;
    *) recipe="$arg" ;;
  esac
done
echo "Processing $recipe"
case "$recipe" in
  Slow*) exec sleep 10 ;;
  Fail*) echo "boom: $recipe" >&2; exit 1 ;;
  Garbage*) echo '<plist><dict><key>truncated' > "$report" ;;
  Partial*) cat > "$report" <<'PLIST'
<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
  <key>failures</key>
  <array>
    <dict>
      <key>message</key><string>Error in Partial: code signature mismatch</string>
      <key>recipe</key><string>Partial</string>
    </dict>
  </array>
  <key>summary_results</key>
  <dict>
    <key>munki_importer_summary_result</key>
    <dict>
      <key>data_rows</key>
      <array>
        <dict>
          <key>name</key><string>Thunderbird</string>
          <key>version</key><string>115.5</string>
        </dict>
      </array>
    </dict>
  </dict>
</dict>
</plist>
PLIST
    echo "some processor failed" >&2
    exit 70 ;;
  NoReport*) ;;
  Import*) cat > "$report" <<'PLIST'
<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>failures</key>
  <array/>
  <key>summary_results</key>
  <dict>
    <key>munki_importer_summary_result</key>
    <dict>
      <key>data_rows</key>
      <array>
        <dict>
          <key>name</key><string>Firefox</string>
          <key>version</key><string>120.0</string>
        </dict>
      </array>
      <key>header</key>
      <array><string>name</string><string>version</string></array>
      <key>summary_text</key>
      <string>The following new items were imported into Munki:</string>
    </dict>
  </dict>
</dict>
</plist>
PLIST
  ;;
  *) cat > "$report" <<'PLIST'
<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
  <key>failures</key>
  <array/>
  <key>summary_results</key>
  <dict/>
</dict>
</plist>
PLIST
  ;;
esac
exit 0
"#;

const FAKE_MAKECATALOGS: &str = r#"#!/bin/sh
touch "$1/catalogs-rebuilt"
"#;

const FAILING_MAKECATALOGS: &str = r#"#!/bin/sh
echo "Munki repo not found: $1" >&2
exit 2
"#;

struct FakeTools {
    autopkg: PathBuf,
    makecatalogs: PathBuf,
    failing_makecatalogs: PathBuf,
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Written once per test binary, before any test spawns a process.
fn tools() -> &'static FakeTools {
    static TOOLS: OnceLock<FakeTools> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("autopkgd-fake-tools");
        std::fs::create_dir_all(&dir).unwrap();
        FakeTools {
            autopkg: write_script(&dir, "autopkg", FAKE_AUTOPKG),
            makecatalogs: write_script(&dir, "makecatalogs", FAKE_MAKECATALOGS),
            failing_makecatalogs: write_script(&dir, "makecatalogs-fail", FAILING_MAKECATALOGS),
        }
    })
}

fn autopkg(reports: &Path, check: bool, timeout: Duration) -> Autopkg {
    Autopkg::new(&tools().autopkg, reports, check, timeout)
}

// --- run_with_timeout ---

#[test]
fn test_run_with_timeout_captures_output() {
    tools();
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg("echo out; echo err >&2");
    let out = run_with_timeout(cmd, "sh", Duration::from_secs(5)).unwrap();
    assert!(out.success());
    assert_eq!(out.stdout.trim(), "out");
    assert_eq!(out.stderr.trim(), "err");
    assert!(out.check("sh").is_ok());
}

#[test]
fn test_run_with_timeout_kills_on_timeout() {
    tools();
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg("exec sleep 10");
    let start = Instant::now();
    let out = run_with_timeout(cmd, "sleeper", Duration::from_millis(200)).unwrap();
    assert!(out.timed_out);
    assert!(out.status.is_none());
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(format!("{:#}", out.check("sleeper").unwrap_err()).contains("timed out"));
}

#[test]
fn test_nonzero_exit_uses_stderr_as_error() {
    tools();
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg("echo 'bad thing' >&2; exit 3");
    let out = run_with_timeout(cmd, "sh", Duration::from_secs(5)).unwrap();
    assert!(!out.success());
    assert_eq!(format!("{:#}", out.check("sh").unwrap_err()), "sh: bad thing");
}

#[test]
fn test_spawn_failure_is_error() {
    tools();
    let cmd = Command::new("/nonexistent/autopkg");
    assert!(run_with_timeout(cmd, "missing", Duration::from_secs(1)).is_err());
}

// --- Autopkg ---

#[test]
fn test_import_recipe_report_is_decoded() {
    let reports = tempfile::tempdir().unwrap();
    let exec = autopkg(reports.path(), false, Duration::from_secs(10));
    let run = exec.run("Import-Firefox");
    assert!(run.error.is_none(), "{:?}", run.error);
    assert!(run.output.contains("Processing Import-Firefox"));
    let result = &run.report.summary_results["munki_importer_summary_result"];
    assert_eq!(result.header, vec!["name", "version"]);
    assert_eq!(result.data_rows.len(), 1);
    assert_eq!(result.data_rows[0].get_str("name").unwrap(), "Firefox");
    assert_eq!(result.data_rows[0].get_str("version").unwrap(), "120.0");
    assert!(reports.path().join("Import-Firefox").is_file());
}

#[test]
fn test_plain_recipe_gives_empty_report() {
    let reports = tempfile::tempdir().unwrap();
    let exec = autopkg(reports.path(), false, Duration::from_secs(10));
    let run = exec.run("Plain");
    assert!(run.error.is_none());
    assert!(run.report.is_empty());
}

#[test]
fn test_check_flag_is_passed() {
    let reports = tempfile::tempdir().unwrap();
    let run = autopkg(reports.path(), true, Duration::from_secs(10)).run("Plain");
    assert!(run.output.contains("check mode"));
    let run = autopkg(reports.path(), false, Duration::from_secs(10)).run("Plain");
    assert!(!run.output.contains("check mode"));
}

#[test]
fn test_failed_recipe_without_report_gives_empty_report() {
    let reports = tempfile::tempdir().unwrap();
    let run = autopkg(reports.path(), false, Duration::from_secs(10)).run("Fail-Thing");
    assert!(run.report.is_empty());
    assert!(run.error.unwrap().contains("boom: Fail-Thing"));
}

#[test]
fn test_failed_recipe_report_is_still_decoded() {
    let reports = tempfile::tempdir().unwrap();
    let run = autopkg(reports.path(), false, Duration::from_secs(10)).run("Partial-Thing");
    assert!(run.error.unwrap().contains("some processor failed"));
    assert_eq!(run.report.failures.len(), 1);
    assert!(run.report.has_result("munki_importer_summary_result"));
    let rows = &run.report.summary_results["munki_importer_summary_result"].data_rows;
    assert_eq!(rows[0].get_str("name").unwrap(), "Thunderbird");
}

#[test]
fn test_timed_out_recipe_gives_empty_report() {
    let reports = tempfile::tempdir().unwrap();
    let exec = autopkg(reports.path(), false, Duration::from_millis(300));
    let start = Instant::now();
    let report = exec.execute("Slow-Thing");
    assert!(report.is_empty());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_undecodable_report_gives_empty_report() {
    let reports = tempfile::tempdir().unwrap();
    let run = autopkg(reports.path(), false, Duration::from_secs(10)).run("Garbage");
    assert!(run.report.is_empty());
    assert!(run.error.unwrap().contains("decode report plist"));
}

#[test]
fn test_stale_report_is_not_reused() {
    let reports = tempfile::tempdir().unwrap();
    let exec = autopkg(reports.path(), false, Duration::from_secs(10));
    // Leave an import report under the name of a recipe that writes none.
    let imported = exec.run("Import-Old");
    assert!(!imported.report.is_empty());
    std::fs::rename(
        reports.path().join("Import-Old"),
        reports.path().join("NoReport"),
    )
    .unwrap();
    let run = exec.run("NoReport");
    assert!(run.report.is_empty());
    assert!(run.error.unwrap().contains("read report"));
}

#[test]
fn test_missing_autopkg_binary_gives_empty_report() {
    let reports = tempfile::tempdir().unwrap();
    let exec = Autopkg::new(
        Path::new("/nonexistent/autopkg"),
        reports.path(),
        false,
        Duration::from_secs(1),
    );
    assert!(exec.execute("Anything").is_empty());
}

#[test]
fn test_info_returns_output() {
    let reports = tempfile::tempdir().unwrap();
    let exec = autopkg(reports.path(), false, Duration::from_secs(10));
    assert!(exec.info("Firefox.munki").unwrap().contains("fake info for Firefox.munki"));
    let err = exec.info("Missing.munki").unwrap_err();
    assert!(format!("{err:#}").contains("No valid recipe found"));
}

// --- MakeCatalogs ---

#[test]
fn test_makecatalogs_runs_against_repo() {
    let repo = tempfile::tempdir().unwrap();
    let mk = MakeCatalogs::new(&tools().makecatalogs, repo.path(), Duration::from_secs(10));
    mk.rebuild().unwrap();
    assert!(repo.path().join("catalogs-rebuilt").exists());
}

#[test]
fn test_makecatalogs_failure_is_error() {
    let repo = tempfile::tempdir().unwrap();
    let mk = MakeCatalogs::new(
        &tools().failing_makecatalogs,
        repo.path(),
        Duration::from_secs(10),
    );
    let err = mk.rebuild().unwrap_err();
    assert!(format!("{err:#}").contains("Munki repo not found"));
}

// --- full cycle with real processes ---

fn cycle_config(dir: &Path, recipes: &[&str], makecatalogs: &Path) -> Config {
    let reports = dir.join("reports");
    let repo = dir.join("repo");
    std::fs::create_dir_all(&reports).unwrap();
    std::fs::create_dir_all(&repo).unwrap();
    let recipes_file = dir.join("recipes.txt");
    std::fs::write(&recipes_file, recipes.join("\n")).unwrap();
    Config {
        autopkg_path: tools().autopkg.clone(),
        makecatalogs_path: makecatalogs.to_path_buf(),
        recipes_file,
        munki_repo: repo,
        reports_path: reports,
        max_processes: 2,
        exec_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

#[test]
fn test_cycle_with_timeout_and_import_rebuilds() {
    let dir = tempfile::tempdir().unwrap();
    let config = cycle_config(
        dir.path(),
        &["Import-A", "Slow-B", "#Import-C", "MakeCatalogs.munki", "Plain-D", "Fail-E"],
        &tools().makecatalogs,
    );
    let summary = Coordinator::from_config(&config, None).run_cycle().unwrap();
    assert_eq!(summary.dispatched, 4);
    assert_eq!(summary.received, 4);
    assert!(summary.catalogs_modified);
    assert_eq!(summary.rebuild, RebuildOutcome::Rebuilt);
    assert!(config.munki_repo.join("catalogs-rebuilt").exists());
}

#[test]
fn test_cycle_without_import_skips_makecatalogs() {
    let dir = tempfile::tempdir().unwrap();
    let config = cycle_config(dir.path(), &["Plain-A", "Fail-B"], &tools().makecatalogs);
    let summary = autopkgd::run_once(&config).unwrap();
    assert_eq!(summary.received, 2);
    assert_eq!(summary.rebuild, RebuildOutcome::Skipped);
    assert!(!config.munki_repo.join("catalogs-rebuilt").exists());
}

#[test]
fn test_cycle_rebuilds_after_partially_failed_import() {
    let dir = tempfile::tempdir().unwrap();
    let config = cycle_config(dir.path(), &["Plain-A", "Partial-B"], &tools().makecatalogs);
    let summary = Coordinator::from_config(&config, None).run_cycle().unwrap();
    assert_eq!(summary.received, 2);
    assert!(summary.catalogs_modified);
    assert_eq!(summary.rebuild, RebuildOutcome::Rebuilt);
    assert!(config.munki_repo.join("catalogs-rebuilt").exists());
}

#[test]
fn test_cycle_survives_makecatalogs_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = cycle_config(dir.path(), &["Import-A"], &tools().failing_makecatalogs);
    let coordinator = Coordinator::new(
        &config,
        Arc::new(Autopkg::from_config(&config)),
        Arc::new(MakeCatalogs::from_config(&config)),
    );
    let summary = coordinator.run_cycle().unwrap();
    assert!(matches!(summary.rebuild, RebuildOutcome::Failed(_)));
}
