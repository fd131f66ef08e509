use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::{debug, info};
use similar::{ChangeTag, TextDiff};

use permset_core::merge::parse_overrides;
use permset_core::{
    Category, DedupPolicy, DefaultField, Merger, PermissionDocument, validate_document,
};
use permset_provider::resource::attributes_from_json;
use permset_provider::{
    PermissionDiff, PermissionSetDataSource, PermsetProvider, Resource, ResourceType, State,
    TenantRoleResource,
};

#[derive(Parser)]
#[command(name = "permset")]
#[command(about = "Merge and inspect role permission sets", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge override permission sets onto a base permission set
    Merge {
        /// Base permission set JSON file ("-" for stdin)
        base: PathBuf,

        /// Override permission set JSON files, applied in order
        #[arg(long = "override", short = 'o')]
        overrides: Vec<PathBuf>,

        /// Write the merged permission set to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// How duplicate entries are collapsed
        #[arg(long, value_enum, default_value_t = DedupArg::LastWriteWins)]
        dedup: DedupArg,

        /// Reject values outside each category's vocabulary
        #[arg(long)]
        validate: bool,
    },
    /// Check default and access values of permission set files
    Validate {
        /// Permission set JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show what the overrides change compared to the base
    Diff {
        /// Base permission set JSON file ("-" for stdin)
        base: PathBuf,

        /// Override permission set JSON files, applied in order
        #[arg(long = "override", short = 'o')]
        overrides: Vec<PathBuf>,

        /// How duplicate entries are collapsed
        #[arg(long, value_enum, default_value_t = DedupArg::LastWriteWins)]
        dedup: DedupArg,

        /// Reject values outside each category's vocabulary
        #[arg(long)]
        validate: bool,
    },
    /// List permission categories and their access values
    Categories {
        /// Category names, collection fields or default fields (all when omitted)
        names: Vec<String>,
    },
    /// Show the attribute schema of a resource type
    Schema {
        /// Resource type name (all types when omitted)
        resource_type: Option<String>,
    },
    /// Evaluate a permission_set data source from an attribute file
    Read {
        /// JSON object with the data source attributes
        file: PathBuf,
    },
    /// Build the tenant role request body from an attribute file
    Role {
        /// JSON object with the tenant_role attributes
        file: PathBuf,

        /// Stored state attributes to plan against
        #[arg(long)]
        current: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DedupArg {
    WholeEntry,
    LastWriteWins,
}

impl From<DedupArg> for DedupPolicy {
    fn from(arg: DedupArg) -> Self {
        match arg {
            DedupArg::WholeEntry => DedupPolicy::WholeEntry,
            DedupArg::LastWriteWins => DedupPolicy::LastWriteWins,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Merge {
            base,
            overrides,
            out,
            dedup,
            validate,
        } => run_merge(&base, &overrides, out.as_deref(), merger(dedup, validate)),
        Commands::Validate { files } => run_validate(&files),
        Commands::Diff {
            base,
            overrides,
            dedup,
            validate,
        } => run_diff(&base, &overrides, merger(dedup, validate)),
        Commands::Categories { names } => run_categories(&names),
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
        Commands::Read { file } => run_read(&file),
        Commands::Role { file, current } => run_role(&file, current.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn merger(dedup: DedupArg, validate: bool) -> Merger {
    Merger::new()
        .with_dedup(dedup.into())
        .with_validation(validate)
}

fn is_stdin(path: &Path) -> bool {
    path == Path::new("-")
}

/// Stdin can only be consumed once
fn check_single_stdin<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<(), String> {
    if paths.into_iter().filter(|path| is_stdin(path)).count() > 1 {
        return Err("\"-\" (stdin) can only be given once".to_string());
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String, String> {
    if is_stdin(path) {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        return Ok(content);
    }
    fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

/// Read the base file and every override file
fn read_inputs(base: &Path, overrides: &[PathBuf]) -> Result<(String, Vec<String>), String> {
    check_single_stdin(std::iter::once(base).chain(overrides.iter().map(PathBuf::as_path)))?;

    let base_json = read_input(base)?;
    let override_json = overrides
        .iter()
        .map(|path| read_input(path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((base_json, override_json))
}

/// Append the offending file to errors that name an override index
fn describe_merge_error(error: permset_core::MergeError, overrides: &[PathBuf]) -> String {
    match error.override_index().and_then(|i| overrides.get(i)) {
        Some(path) => format!("{} ({})", error, path.display()),
        None => error.to_string(),
    }
}

/// Merge the base file with override files, returning pretty JSON
fn merge_files(base: &Path, overrides: &[PathBuf], merger: Merger) -> Result<String, String> {
    let (base_json, override_json) = read_inputs(base, overrides)?;

    debug!(
        "Merging {} with {} overrides",
        base.display(),
        override_json.len()
    );

    merger
        .merge_json(&base_json, &override_json)
        .map_err(|e| describe_merge_error(e, overrides))
}

fn run_merge(
    base: &Path,
    overrides: &[PathBuf],
    out: Option<&Path>,
    merger: Merger,
) -> Result<(), String> {
    let merged = merge_files(base, overrides, merger)?;

    match out {
        Some(path) => {
            fs::write(path, format!("{}\n", merged))
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            info!("Wrote merged permission set to {}", path.display());
        }
        None => println!("{}", merged),
    }
    Ok(())
}

/// Collect validation messages for one file
fn validate_file(path: &Path) -> Result<Vec<String>, String> {
    let content = read_input(path)?;
    let doc = PermissionDocument::from_json(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

    Ok(match validate_document(&doc) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    })
}

fn run_validate(files: &[PathBuf]) -> Result<(), String> {
    let mut invalid = 0;
    for file in files {
        let messages = validate_file(file)?;
        if messages.is_empty() {
            println!("{} {}", "✓".green(), file.display());
        } else {
            invalid += 1;
            println!("{} {}", "✗".red(), file.display());
            for message in messages {
                println!("    {}", message);
            }
        }
    }

    if invalid > 0 {
        Err(format!("{} of {} files are invalid", invalid, files.len()))
    } else {
        Ok(())
    }
}

/// Canonical base and merged result as pretty JSON
fn diff_files(
    base: &Path,
    overrides: &[PathBuf],
    merger: Merger,
) -> Result<(String, String), String> {
    let (base_json, override_json) = read_inputs(base, overrides)?;
    let base_doc = PermissionDocument::from_json(&base_json)
        .map_err(|e| format!("Failed to parse {}: {}", base.display(), e))?;
    let override_docs =
        parse_overrides(&override_json).map_err(|e| describe_merge_error(e, overrides))?;

    let original = permset_core::canonicalize(base_doc.clone(), merger.dedup())
        .to_json_pretty()
        .map_err(|e| e.to_string())?;
    let merged = merger
        .merge(&base_doc, &override_docs)
        .and_then(|doc| {
            doc.to_json_pretty()
                .map_err(permset_core::MergeError::Serialization)
        })
        .map_err(|e| describe_merge_error(e, overrides))?;
    Ok((original, merged))
}

fn run_diff(base: &Path, overrides: &[PathBuf], merger: Merger) -> Result<(), String> {
    let (original, merged) = diff_files(base, overrides, merger)?;

    if original == merged {
        println!("{}", "No changes.".green());
        return Ok(());
    }

    println!("{} {}:", "Diff for".cyan().bold(), base.display());
    print!("{}", render_diff(&original, &merged));
    Ok(())
}

fn render_diff(original: &str, merged: &str) -> String {
    let mut rendered = String::new();
    let diff = TextDiff::from_lines(original, merged);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        rendered.push_str(&format!("{}{}", sign, change));
    }
    rendered
}

/// Resolve category filters; a default field selects its category
fn select_categories(names: &[String]) -> Result<Vec<Category>, String> {
    if names.is_empty() {
        return Ok(Category::ALL.to_vec());
    }

    let mut selected = Vec::new();
    for name in names {
        let category = Category::from_name(name)
            .or_else(|| DefaultField::from_json_field(name).map(|field| field.category()))
            .ok_or_else(|| format!("Unknown category: {}", name))?;
        if !selected.contains(&category) {
            selected.push(category);
        }
    }
    Ok(selected)
}

fn run_categories(names: &[String]) -> Result<(), String> {
    for category in select_categories(names)? {
        let default = category
            .default_field()
            .map(|field: DefaultField| {
                format!(
                    " (default {}: {})",
                    field.json_field(),
                    field.allowed_values().join(" | ")
                )
            })
            .unwrap_or_default();
        println!(
            "{} [{}]{}",
            category.collection_field().bold(),
            category.key_kind(),
            default
        );
        println!("    access: {}", category.access_values().join(" | "));
    }
    Ok(())
}

fn format_schema(resource_type: &dyn ResourceType) -> String {
    let schema = resource_type.schema();
    let kind = if resource_type.is_data_source() {
        "data source"
    } else {
        "resource"
    };
    let mut lines = vec![format!("{} {}", kind.dimmed(), schema.resource_type.bold())];
    if let Some(description) = &schema.description {
        lines.push(format!("  {}", description.dimmed()));
    }
    for name in schema.attribute_names() {
        let attribute = &schema.attributes[name];
        let mut flags = Vec::new();
        if attribute.required {
            flags.push("required");
        }
        if attribute.computed {
            flags.push("computed");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        };
        lines.push(format!("  {}: {}{}", name, attribute.attr_type, flags));
    }
    lines.join("\n")
}

fn run_schema(resource_type: Option<&str>) -> Result<(), String> {
    let provider = PermsetProvider::new();
    match resource_type {
        Some(name) => {
            let resource_type = provider
                .resource_type(name)
                .ok_or_else(|| format!("Unknown resource type: {}", name))?;
            println!("{}", format_schema(resource_type.as_ref()));
        }
        None => {
            for resource_type in provider.resource_types() {
                println!("{}\n", format_schema(resource_type.as_ref()));
            }
        }
    }
    Ok(())
}

fn load_resource(path: &Path, resource_type: &str) -> Result<Resource, String> {
    let content = read_input(path)?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    let attributes = attributes_from_json(&json)
        .map_err(|e| format!("Failed to read attributes from {}: {}", path.display(), e))?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stdin");
    Ok(Resource::new(resource_type, name).with_attributes(attributes))
}

fn read_data_source(path: &Path) -> Result<String, String> {
    let resource = load_resource(path, PermissionSetDataSource::NAME)?;
    let state = PermsetProvider::new()
        .permission_set()
        .read(&resource)
        .map_err(|e| e.to_string())?;
    state
        .get_string(permset_provider::permission_set::JSON)
        .map(str::to_string)
        .ok_or_else(|| "Data source produced no json attribute".to_string())
}

fn run_read(file: &Path) -> Result<(), String> {
    println!("{}", read_data_source(file)?);
    Ok(())
}

fn run_role(file: &Path, current: Option<&Path>) -> Result<(), String> {
    let resource = load_resource(file, TenantRoleResource::NAME)?;
    let tenant_role = PermsetProvider::new().tenant_role();

    let Some(current) = current else {
        let payload = tenant_role.role_payload(&resource).map_err(|e| e.to_string())?;
        let rendered = serde_json::to_string_pretty(&payload).map_err(|e| e.to_string())?;
        println!("{}", rendered);
        return Ok(());
    };

    let stored = load_resource(current, TenantRoleResource::NAME)?;
    let state = State::new(resource.id.clone(), stored.attributes);
    match tenant_role.plan(&resource, &state).map_err(|e| e.to_string())? {
        PermissionDiff::NoChange => {
            println!("{}", "No changes. Permission set is up-to-date.".green());
        }
        PermissionDiff::Update { changed_fields } => {
            println!("{} {}", "~".yellow().bold(), resource.id);
            for field in changed_fields {
                println!("    {} {}", "~".yellow(), field);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn merge_files_applies_overrides_in_order() {
        let dir = TempDir::new().unwrap();
        let base = write_file(
            &dir,
            "base.json",
            r#"{"default_group_permission":"none","group_permissions":[{"id":5,"access":"none"}]}"#,
        );
        let first = write_file(
            &dir,
            "first.json",
            r#"{"group_permissions":[{"id":5,"access":"full"},{"id":7,"access":"read"}]}"#,
        );
        let second = write_file(&dir, "second.json", r#"{"default_group_permission":"full"}"#);

        let merged = merge_files(&base, &[first, second], Merger::new()).unwrap();
        let doc = PermissionDocument::from_json(&merged).unwrap();
        assert_eq!(doc.default_value(DefaultField::Group), Some("full"));
        assert_eq!(doc.entry_count(Category::Group), 2);
    }

    #[test]
    fn merge_files_names_malformed_override_file() {
        let dir = TempDir::new().unwrap();
        let base = write_file(&dir, "base.json", "{}");
        let good = write_file(&dir, "good.json", "{}");
        let bad = write_file(&dir, "bad.json", "{\"task_permissions\":");

        let error = merge_files(&base, &[good, bad], Merger::new()).unwrap_err();
        assert!(error.contains("index 1"));
        assert!(error.contains("bad.json"));
    }

    #[test]
    fn merge_files_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        let error = merge_files(&missing, &[], Merger::new()).unwrap_err();
        assert!(error.starts_with("Failed to read"));
    }

    #[test]
    fn run_merge_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let base = write_file(&dir, "base.json", r#"{"default_task_permission":"full"}"#);
        let out = dir.path().join("out.json");

        run_merge(&base, &[], Some(&out), merger(DedupArg::LastWriteWins, true)).unwrap();
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "{\n  \"default_task_permission\": \"full\"\n}\n"
        );
    }

    #[test]
    fn validate_file_lists_problems() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "role.json",
            r#"{"default_persona":"admin","vdi_pool_permissions":[{"id":1,"access":"read"}]}"#,
        );

        let messages = validate_file(&path).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("default_persona"));
        assert!(messages[1].contains("vdi_pool_permissions[1].access"));
    }

    #[test]
    fn render_diff_marks_changed_lines() {
        colored::control::set_override(false);
        let rendered = render_diff("{\n  \"a\": 1\n}", "{\n  \"a\": 2\n}");
        assert_eq!(rendered, " {\n-  \"a\": 1\n+  \"a\": 2\n }\n");
    }

    #[test]
    fn read_data_source_from_attribute_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "ops.json",
            r#"{
                "default_task_permission": "none",
                "task_permission": [{"id": 3, "access": "full"}],
                "override_permission_sets": ["{\"default_task_permission\":\"full\"}"]
            }"#,
        );

        let json = read_data_source(&path).unwrap();
        let doc = PermissionDocument::from_json(&json).unwrap();
        assert_eq!(doc.default_value(DefaultField::Task), Some("full"));
        assert_eq!(doc.entry_count(Category::Task), 1);
    }

    #[test]
    fn load_resource_requires_object() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "list.json", "[]");
        let error = load_resource(&path, TenantRoleResource::NAME).unwrap_err();
        assert!(error.ends_with("Expected a JSON object of attributes, got array"));
    }

    #[test]
    fn load_resource_names_null_override() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "ops.json",
            r#"{"override_permission_sets": [null, "{}", "{"]}"#,
        );
        let error = load_resource(&path, PermissionSetDataSource::NAME).unwrap_err();
        assert!(error.contains("override_permission_sets[0]"));
    }

    #[test]
    fn render_diff_keeps_existing_newlines() {
        colored::control::set_override(false);
        let rendered = render_diff("{\n  \"a\": 1\n}\n", "{\n  \"a\": 2\n}\n");
        assert_eq!(rendered, " {\n-  \"a\": 1\n+  \"a\": 2\n }\n");
    }

    #[test]
    fn diff_files_follows_dedup_policy() {
        let dir = TempDir::new().unwrap();
        let base = write_file(
            &dir,
            "base.json",
            r#"{"group_permissions":[{"id":5,"access":"none"}]}"#,
        );
        let over = write_file(
            &dir,
            "over.json",
            r#"{"group_permissions":[{"id":5,"access":"read"},{"id":5,"access":"full"}]}"#,
        );

        let (_, last_wins) =
            diff_files(&base, &[over.clone()], merger(DedupArg::LastWriteWins, false)).unwrap();
        let doc = PermissionDocument::from_json(&last_wins).unwrap();
        assert_eq!(doc.entry_count(Category::Group), 1);

        let (_, whole_entry) =
            diff_files(&base, &[over], merger(DedupArg::WholeEntry, false)).unwrap();
        let doc = PermissionDocument::from_json(&whole_entry).unwrap();
        assert_eq!(doc.entry_count(Category::Group), 2);
    }

    #[test]
    fn diff_files_validates_when_asked() {
        let dir = TempDir::new().unwrap();
        let base = write_file(&dir, "base.json", "{}");
        let over = write_file(&dir, "over.json", r#"{"default_task_permission":"read"}"#);

        assert!(diff_files(&base, &[over.clone()], Merger::new()).is_ok());
        let error = diff_files(&base, &[over], merger(DedupArg::LastWriteWins, true)).unwrap_err();
        assert!(error.contains("over.json"));
    }

    #[test]
    fn stdin_may_only_be_given_once() {
        let stdin = PathBuf::from("-");
        let error = merge_files(&stdin, &[PathBuf::from("-")], Merger::new()).unwrap_err();
        assert!(error.contains("only be given once"));

        let error = diff_files(
            Path::new("base.json"),
            &[stdin.clone(), stdin],
            Merger::new(),
        )
        .unwrap_err();
        assert!(error.contains("only be given once"));
    }

    #[test]
    fn categories_filter_accepts_every_naming() {
        let selected = select_categories(&[
            "vdi_pool".to_string(),
            "task_permissions".to_string(),
            "default_persona".to_string(),
            "vdi_pool_permissions".to_string(),
        ])
        .unwrap();
        assert_eq!(
            selected,
            vec![Category::VdiPool, Category::Task, Category::Persona]
        );
        assert_eq!(select_categories(&[]).unwrap().len(), Category::ALL.len());
        assert!(select_categories(&["clouds".to_string()]).is_err());
    }

    #[test]
    fn schema_listing_marks_data_sources() {
        colored::control::set_override(false);
        let provider = PermsetProvider::new();
        let data_source = format_schema(&provider.permission_set());
        assert!(data_source.starts_with("data source permission_set"));
        let resource = format_schema(&provider.tenant_role());
        assert!(resource.starts_with("resource tenant_role"));
    }

    #[test]
    fn cli_parses_repeated_overrides() {
        let cli = Cli::parse_from([
            "permset",
            "merge",
            "base.json",
            "-o",
            "a.json",
            "--override",
            "b.json",
            "--dedup",
            "whole-entry",
        ]);
        match cli.command {
            Commands::Merge {
                overrides, dedup, ..
            } => {
                assert_eq!(overrides, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
                assert_eq!(dedup, DedupArg::WholeEntry);
            }
            _ => panic!("Expected merge command"),
        }
    }
}
