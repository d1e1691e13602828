// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use diavirt_types::VirtualMachineConfiguration;
use slog::{o, Drain};
use utm_config::bundle::BundleLocator;
use utm_config::HostInfo;

#[derive(Parser)]
#[clap(about, version)]
/// Produces diavirt virtual machine configurations.
struct Args {
    /// Log at debug level, including the imported configuration.
    #[clap(short, long, global = true, action)]
    debug: bool,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a UTM virtual machine (Apple Virtualization backend).
    Import {
        /// A VM name as shown in UTM, or the path of a .utm bundle.
        #[clap(value_name = "VM|BUNDLE", action)]
        vm: String,

        /// Directory in which bare VM names are looked up. Defaults to the
        /// sandboxed UTM documents directory in the user's home.
        #[clap(long, env = "DIAVIRT_UTM_DOCUMENTS", action)]
        utm_documents: Option<PathBuf>,

        /// Write the configuration to this file instead of stdout.
        #[clap(short, long, action)]
        output: Option<PathBuf>,
    },

    /// Emit the stock macOS configuration.
    Canned {
        /// Write the configuration to this file instead of stdout.
        #[clap(short, long, action)]
        output: Option<PathBuf>,
    },
}

fn build_log(level: slog::Level) -> (slog::Logger, slog_async::AsyncGuard) {
    // stdout carries the configuration itself.
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let (drain, guard) = slog_async::Async::new(drain).build_with_guard();
    (slog::Logger::root(drain.fuse(), o!()), guard)
}

fn import(
    vm: &str,
    utm_documents: Option<PathBuf>,
    log: &slog::Logger,
) -> anyhow::Result<VirtualMachineConfiguration> {
    let locator = match utm_documents {
        Some(dir) => BundleLocator::new(dir),
        None => BundleLocator::from_env()
            .context("Cannot find the UTM documents directory")?,
    };

    slog::debug!(log, "Resolving VM";
        "vm" => vm,
        "documents" => %locator.documents().display());

    let bundle = locator.locate(vm);
    slog::info!(log, "Importing UTM virtual machine";
        "bundle" => %bundle.display());

    let config = utm_config::import_bundle(&bundle, &HostInfo::detect(), log)
        .with_context(|| format!("Failed to import {vm:?}"))?;
    Ok(config)
}

fn emit(
    config: &VirtualMachineConfiguration,
    output: Option<&Path>,
    log: &slog::Logger,
) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path).with_context(|| {
                format!("Cannot create {}", path.display())
            })?;
            let mut writer = BufWriter::new(file);
            config
                .write_json_pretty(&mut writer)
                .and_then(|()| writer.flush())
                .with_context(|| format!("Cannot write {}", path.display()))?;
            slog::info!(log, "Wrote configuration";
                "path" => %path.display());
        }
        None => {
            config
                .write_json_pretty(std::io::stdout().lock())
                .context("Cannot write configuration to stdout")?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let Args { debug, cmd } = Args::parse();

    let level = if debug { slog::Level::Debug } else { slog::Level::Info };
    let (log, _log_async_guard) = build_log(level);

    let (config, output) = match cmd {
        Command::Import { vm, utm_documents, output } => {
            (import(&vm, utm_documents, &log)?, output)
        }
        Command::Canned { output } => {
            (diavirt_types::canned::canned_mac(), output)
        }
    };

    emit(&config, output.as_deref(), &log)
}
