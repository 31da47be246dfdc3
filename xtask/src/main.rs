//! Build automation for kraze
//!
//! Usage: cargo xtask <command>
//!
//! Available commands:
//! - build: Build the project
//! - test: Run tests
//! - lint-bundles: Validate the starter bundles under demos/bundles against the config loader
//! - dist: Create a distribution package (binary + starter bundles)
//! - install: Install to system
//! - ci: Run CI checks

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use xshell::{cmd, Shell};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for kraze")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build {
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Validate every bundle document under demos/bundles/ through the
    /// config loader, the way `kraze up` would before touching a cluster
    LintBundles,
    /// Create a distribution package: release binary plus the starter
    /// bundles an operator needs to run `kraze up` for the first time
    Dist {
        /// Target triple (e.g., x86_64-unknown-linux-gnu)
        #[arg(long)]
        target: Option<String>,
    },
    /// Install to system
    Install {
        /// Installation prefix (default: /usr/local)
        #[arg(long, default_value = "/usr/local")]
        prefix: String,
    },
    /// Run CI checks (format, clippy, lint-bundles, test)
    Ci,
    /// Format code
    Format {
        /// Check formatting without modifying files
        #[arg(long)]
        check: bool,
    },
    /// Run clippy
    Clippy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    sh.change_dir(project_root());

    match cli.command {
        Commands::Build { release } => build(&sh, release),
        Commands::Test { integration } => test(&sh, integration),
        Commands::LintBundles => lint_bundles(),
        Commands::Dist { target } => dist(&sh, target),
        Commands::Install { prefix } => install(&sh, &prefix),
        Commands::Ci => ci(&sh),
        Commands::Format { check } => format(&sh, check),
        Commands::Clippy => clippy(&sh),
    }
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building kraze...");

    if release {
        cmd!(sh, "cargo build --release").run()?;
        println!("✅ Release build completed: target/release/kraze");
    } else {
        cmd!(sh, "cargo build").run()?;
        println!("✅ Debug build completed: target/debug/kraze");
    }

    Ok(())
}

fn test(sh: &Shell, integration: bool) -> Result<()> {
    println!("🧪 Running tests...");

    if integration {
        cmd!(sh, "cargo test --test '*'").run()?;
    } else {
        cmd!(sh, "cargo test --all").run()?;
    }

    println!("✅ All tests passed");
    Ok(())
}

/// Loads every `*.yaml` under `demos/bundles/` through the same
/// `kraze::load` the CLI calls before reconciling, so a bundle that would
/// reject a service at `kraze up` time is caught here instead of at a
/// demo or in CI on someone else's machine.
fn lint_bundles() -> Result<()> {
    println!("📋 Linting starter bundles...");

    let bundles_dir = project_root().join("demos/bundles");
    let mut entries: Vec<PathBuf> = std::fs::read_dir(&bundles_dir)
        .with_context(|| format!("reading {}", bundles_dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("yaml"))
        .collect();
    entries.sort();

    if entries.is_empty() {
        bail!("no bundle documents found under {}", bundles_dir.display());
    }

    let mut failed = false;
    for path in &entries {
        match kraze::load(path) {
            Ok(bundle) => {
                println!(
                    "  ✅ {} ({} service(s))",
                    path.display(),
                    bundle.service_names().count()
                );
            }
            Err(e) => {
                failed = true;
                println!("  ❌ {}: {e}", path.display());
            }
        }
    }

    if failed {
        bail!("one or more bundles failed to load");
    }

    println!("✅ All bundles are valid");
    Ok(())
}

fn dist(sh: &Shell, target: Option<String>) -> Result<()> {
    println!("📦 Creating distribution package...");

    if let Some(ref target_triple) = target {
        cmd!(sh, "cargo build --release --target {target_triple}").run()?;
    } else {
        cmd!(sh, "cargo build --release").run()?;
    }

    let dist_dir = project_root().join("dist");
    sh.create_dir(&dist_dir)?;

    let binary_src = if let Some(ref target_triple) = target {
        project_root().join(format!("target/{}/release/kraze", target_triple))
    } else {
        project_root().join("target/release/kraze")
    };

    let binary_dst = dist_dir.join("kraze");
    sh.copy_file(&binary_src, &binary_dst)?;

    // The starter bundles ride along so `tar xzf kraze-*.tar.gz && ./kraze up
    // -f bundles/minimal.yaml` works straight out of the archive.
    let bundles_dst = dist_dir.join("bundles");
    sh.create_dir(&bundles_dst)?;
    for entry in std::fs::read_dir(project_root().join("demos/bundles"))? {
        let entry = entry?;
        if entry.path().extension().and_then(|e| e.to_str()) == Some("yaml") {
            sh.copy_file(entry.path(), bundles_dst.join(entry.file_name()))?;
        }
    }

    let version = env!("CARGO_PKG_VERSION");
    let archive_name = format!("kraze-{}.tar.gz", version);

    cmd!(sh, "tar -czf {archive_name} -C dist kraze bundles")
        .run()
        .context("Failed to create tarball")?;

    println!("✅ Distribution package created: {}", archive_name);
    Ok(())
}

fn install(sh: &Shell, prefix: &str) -> Result<()> {
    println!("📥 Installing kraze to {}...", prefix);

    let binary = project_root().join("target/release/kraze");
    if !binary.exists() {
        println!("Building release binary first...");
        cmd!(sh, "cargo build --release").run()?;
    }

    let bin_dir = Path::new(prefix).join("bin");
    sh.create_dir(&bin_dir)?;

    let install_path = bin_dir.join("kraze");
    sh.copy_file(&binary, &install_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&install_path, std::fs::Permissions::from_mode(0o755))?;
    }

    println!("✅ Installed to: {}", install_path.display());
    Ok(())
}

fn ci(sh: &Shell) -> Result<()> {
    println!("🔍 Running CI checks...");

    println!("\n📝 Checking formatting...");
    format(sh, true)?;

    println!("\n🔧 Running clippy...");
    clippy(sh)?;

    println!("\n📋 Linting starter bundles...");
    lint_bundles()?;

    println!("\n🧪 Running tests...");
    test(sh, false)?;

    println!("\n✅ All CI checks passed!");
    Ok(())
}

fn format(sh: &Shell, check: bool) -> Result<()> {
    if check {
        cmd!(sh, "cargo fmt --all -- --check").run()?;
        println!("✅ Code formatting is correct");
    } else {
        cmd!(sh, "cargo fmt --all").run()?;
        println!("✅ Code formatted");
    }
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(
        sh,
        "cargo clippy --all-targets --all-features -- -D warnings"
    )
    .run()?;
    println!("✅ Clippy checks passed");
    Ok(())
}

fn project_root() -> PathBuf {
    Path::new(&env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(1)
        .unwrap()
        .to_path_buf()
}
