use std::path::Path;
use std::sync::Arc;

use veneer_core::{
    Checker, ConfigScope, MemoryFileSystem, OverlayManager, ScriptedAnalyzer,
};
use veneer_transform::DiagnosticKind;

fn project() -> (Arc<ConfigScope>, MemoryFileSystem) {
    let config = Arc::new(ConfigScope::defaults_at("/proj"));
    let fs = MemoryFileSystem::new();
    (config, fs)
}

#[test]
fn read_file_substitutes_transformed_scripts() {
    let (config, fs) = project();
    fs.set_file(
        "/proj/src/greeting.ts",
        "export default class Greeting extends Component {\n\
         \x20 static template = hbs`{{@target}}`;\n\
         }\n",
    );
    fs.set_file("/proj/src/notes.txt", "just some notes\n");

    let mut overlay = OverlayManager::new(config, fs);

    let script = overlay.read_file(Path::new("/proj/src/greeting.ts")).unwrap();
    assert!(script.contains("$ctx.args.target"));
    assert!(!script.contains("hbs`"));

    // Non-scripts pass through untouched.
    let notes = overlay.read_file(Path::new("/proj/src/notes.txt")).unwrap();
    assert_eq!(notes, "just some notes\n");
}

#[test]
fn scripts_outside_the_project_pass_through() {
    let (config, fs) = project();
    fs.set_file(
        "/elsewhere/app.ts",
        "const t = hbs`{{@x}}`;\n",
    );

    let mut overlay = OverlayManager::new(config, fs);
    let raw = overlay.read_file(Path::new("/elsewhere/app.ts")).unwrap();
    assert!(raw.contains("hbs`{{@x}}`"));
}

#[test]
fn repeated_reads_serve_the_cached_module() {
    let (config, fs) = project();
    fs.set_file("/proj/app.ts", "const t = hbs`{{@x}}`;\n");

    let mut overlay = OverlayManager::new(config, fs);
    let first = overlay.module_for(Path::new("/proj/app.ts")).unwrap();
    let second = overlay.module_for(Path::new("/proj/app.ts")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(overlay.fs().read_count(Path::new("/proj/app.ts")), 1);
}

#[test]
fn companion_edit_rebuilds_the_merged_module_without_rereading_the_script() {
    let (config, fs) = project();
    fs.set_file(
        "/proj/banner.ts",
        "export default class Banner extends Component {\n}\n",
    );
    fs.set_file("/proj/banner.hbs", "{{this.title}}");

    let mut overlay = OverlayManager::new(config, fs);
    let script = Path::new("/proj/banner.ts");
    let template = Path::new("/proj/banner.hbs");

    let before = overlay.module_for(script).unwrap();
    assert!(before.transformed_contents.contains("$ctx.this.title"));

    overlay.fs().set_file(template, "{{this.subtitle}}");
    overlay.file_changed(template);
    assert!(overlay.cached_module(script).is_none());

    let after = overlay.module_for(script).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(after.transformed_contents.contains("$ctx.this.subtitle"));

    // The script itself was only ever read once.
    assert_eq!(overlay.fs().read_count(script), 1);
    assert_eq!(overlay.fs().read_count(template), 2);
}

#[test]
fn script_edit_evicts_the_module_too() {
    let (config, fs) = project();
    fs.set_file("/proj/banner.ts", "export default class Banner extends Component {\n}\n");
    fs.set_file("/proj/banner.hbs", "{{this.title}}");

    let mut overlay = OverlayManager::new(config, fs);
    let script = Path::new("/proj/banner.ts");

    overlay.module_for(script).unwrap();
    overlay.file_changed(script);
    assert!(overlay.cached_module(script).is_none());
}

#[test]
fn invalidation_is_idempotent_and_ignores_unrelated_files() {
    let (config, fs) = project();
    fs.set_file("/proj/a.ts", "const t = hbs`{{@x}}`;\n");
    fs.set_file("/proj/b.ts", "const t = hbs`{{@y}}`;\n");

    let mut overlay = OverlayManager::new(config, fs);
    let a = Path::new("/proj/a.ts");
    let b = Path::new("/proj/b.ts");

    overlay.module_for(a).unwrap();
    overlay.module_for(b).unwrap();

    // Invalidating one file leaves the other's entry alone.
    overlay.file_changed(a);
    overlay.file_changed(a);
    overlay.file_removed(Path::new("/proj/never-seen.ts"));
    assert!(overlay.cached_module(a).is_none());
    assert!(overlay.cached_module(b).is_some());

    // And the module comes back cleanly afterwards.
    let rebuilt = overlay.module_for(a).unwrap();
    assert!(rebuilt.transformed_contents.contains("$ctx.args.x"));
}

#[test]
fn buffer_contents_supersede_disk() {
    let (config, fs) = project();
    fs.set_file("/proj/app.ts", "const t = hbs`{{@disk}}`;\n");

    let mut overlay = OverlayManager::new(config, fs);
    let path = Path::new("/proj/app.ts");

    overlay.buffer_updated(path, "const t = hbs`{{@buffer}}`;\n");
    let module = overlay.module_for(path).unwrap();
    assert!(module.transformed_contents.contains("$ctx.args.buffer"));
    assert_eq!(overlay.fs().read_count(path), 0);
}

#[test]
fn existence_and_listing_reflect_the_real_filesystem() {
    let (config, fs) = project();
    fs.set_file("/proj/src/app.ts", "const t = hbs`{{@x}}`;\n");
    fs.set_file("/proj/src/app.hbs", "{{@x}}");

    let overlay = OverlayManager::new(config, fs);
    assert!(overlay.file_exists(Path::new("/proj/src/app.ts")));
    assert!(!overlay.file_exists(Path::new("/proj/src/gone.ts")));

    let listing = overlay.read_directory(Path::new("/proj/src")).unwrap();
    assert_eq!(
        listing,
        vec![
            Path::new("/proj/src/app.hbs").to_path_buf(),
            Path::new("/proj/src/app.ts").to_path_buf(),
        ]
    );
}

#[test]
fn watch_registrations_are_recorded() {
    let (config, fs) = project();
    let mut overlay = OverlayManager::new(config, fs);

    overlay.watch_directory("/proj");
    overlay.watch_file("/proj/banner.hbs");

    assert_eq!(overlay.watched_directories(), [Path::new("/proj").to_path_buf()]);
    assert_eq!(overlay.watched_files(), [Path::new("/proj/banner.hbs").to_path_buf()]);
}

#[test]
fn check_run_reconciles_across_the_project() {
    let (config, fs) = project();
    fs.set_file(
        "/proj/ok.ts",
        "export default class Ok extends Component {\n\
         \x20 static template = hbs`{{! @veneer-ignore }}{{@missing}}`;\n\
         }\n",
    );
    fs.set_file("/proj/broken.ts", "const t = hbs`{{`;\n");
    fs.set_file("/proj/loose.hbs", "{{#if");

    let overlay = OverlayManager::new(config, fs);
    let mut analyzer = ScriptedAnalyzer::new();
    analyzer.report_when("$ctx.args.missing", "Property 'missing' does not exist");

    let mut checker = Checker::new(overlay, analyzer);
    let report = checker.run().unwrap();

    assert!(report.has_errors());
    assert_eq!(report.files_checked, 3);

    // The ignored host diagnostic is gone; the two syntax errors remain.
    let kinds: Vec<_> = report.diagnostics.iter().map(|d| d.kind).collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.iter().all(|k| *k == DiagnosticKind::TemplateSyntax));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.path == Path::new("/proj/broken.ts")));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.path == Path::new("/proj/loose.hbs")));
}
