use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use wannier_assigner::{
    assign_trajectory, parser, writer, AssignConfig, CollisionPolicy,
};
use wannier_assigner::writer::{FrameReport, ResultDocument};

const DEFAULT_DIAGNOSTIC_DUMP: &str = "fail_assign_wc.xyz";

#[derive(Parser)]
#[command(author, version, about = "Wannier-center assignment for periodic MD frames")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assigns Wannier centers to lone pairs, bonds and π-bonds.
    Assign {
        /// Input JSON document(s); glob patterns are expanded.
        #[arg(short, long)]
        input: String,

        /// JSON result document.
        #[arg(short, long)]
        output: PathBuf,

        /// JSON file with an assignment configuration.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        bond_tolerance: Option<f64>,

        #[arg(long)]
        pi_radius: Option<f64>,

        /// Skip π-bond assignment.
        #[arg(long)]
        no_pi: bool,

        /// Let lone pairs and bonds reuse claimed centers (older numeric results).
        #[arg(long)]
        legacy_collisions: bool,

        /// Fail when some atoms are not bonded to the representative atom.
        #[arg(long)]
        strict_connectivity: bool,

        /// XYZ file receiving frames with unresolved molecules.
        #[arg(long)]
        diagnostics: Option<PathBuf>,

        /// Do not write unresolved frames anywhere.
        #[arg(long, conflicts_with = "diagnostics")]
        no_diagnostics: bool,

        /// Also write atoms, bond centers and assigned centers as XYZ.
        #[arg(long)]
        augmented_xyz: Option<PathBuf>,

        /// Worker threads (0 = one per core).
        #[arg(long, default_value_t = 0)]
        jobs: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let start_time = Instant::now();

    match cli.command {
        Commands::Assign {
            input, output, config,
            bond_tolerance, pi_radius, no_pi, legacy_collisions, strict_connectivity,
            diagnostics, no_diagnostics, augmented_xyz, jobs,
        } => {
            println!("--- Wannier Center Assignment ---");

            // 1. Configuration
            let mut config = match &config {
                Some(path) => parser::config_from_json(path)
                    .with_context(|| format!("Could not read config {:?}", path))?,
                None => AssignConfig::default(),
            };
            if let Some(tol) = bond_tolerance {
                config.bond_tolerance = tol;
            }
            if let Some(radius) = pi_radius {
                if radius <= 0.0 {
                    anyhow::bail!("--pi-radius must be positive, got {}", radius);
                }
                config.pi_radius = radius;
            }
            if no_pi {
                config.assign_pi = false;
            }
            if legacy_collisions {
                config.collision_policy = CollisionPolicy::Legacy;
            }
            if strict_connectivity {
                config.disconnected_atoms_fatal = true;
            }
            if no_diagnostics {
                config.diagnostic_dump = None;
            } else if let Some(path) = diagnostics {
                config.diagnostic_dump = Some(path);
            } else if config.diagnostic_dump.is_none() {
                config.diagnostic_dump = Some(PathBuf::from(DEFAULT_DIAGNOSTIC_DUMP));
            }

            // 2. Inputs
            let paths: Vec<PathBuf> = glob::glob(&input)
                .with_context(|| format!("Invalid input pattern '{}'", input))?
                .collect::<Result<_, _>>()?;
            if paths.is_empty() {
                anyhow::bail!("No input matches '{}'", input);
            }

            let mut documents = Vec::with_capacity(paths.len());
            for path in &paths {
                println!("Reading {:?}...", path);
                let document = parser::from_json(path)
                    .with_context(|| format!("Could not parse input {:?}", path))?;
                println!(
                    "-> {} frames, {} atoms per molecule, {} bonds ({} double).",
                    document.frames.len(),
                    document.topology.num_atoms(),
                    document.topology.bonds().len(),
                    document.topology.double_bonds().len()
                );
                documents.push(document);
            }

            // 3. Assignment
            let mut results = Vec::with_capacity(documents.len());
            for (path, document) in paths.iter().zip(&documents) {
                println!("Assigning {:?}...", path);
                let frames = assign_trajectory(&document.frames, &document.topology, &config, jobs)
                    .with_context(|| format!("Assignment failed for {:?}", path))?;
                results.push(frames);
            }

            // 4. Report
            if let Some(xyz) = &augmented_xyz {
                std::fs::File::create(xyz).with_context(|| format!("Could not create {:?}", xyz))?;
            }
            let mut reports = Vec::new();
            let mut failed = 0;
            for ((path, document), frames) in paths.iter().zip(&documents).zip(&results) {
                let source = path.display().to_string();
                for (i, result) in frames.iter().enumerate() {
                    match result {
                        Ok(assignment) => {
                            if let Some(xyz) = &augmented_xyz {
                                writer::append_augmented_xyz(
                                    xyz,
                                    &document.frames[i],
                                    assignment,
                                    &format!("source={} frame={}", source, i),
                                )
                                .with_context(|| format!("Could not write {:?}", xyz))?;
                            }
                            reports.push(FrameReport::success(source.clone(), i, assignment));
                        }
                        Err(e) => {
                            failed += 1;
                            reports.push(FrameReport::failure(source.clone(), i, e.to_string()));
                        }
                    }
                }
            }

            println!("\nAssigned {} frames ({} failed).", reports.len() - failed, failed);
            println!("Writing results to {:?}...", output);
            let document = ResultDocument { config: &config, frames: reports };
            writer::to_json(&document, &output)
                .with_context(|| format!("Could not write {:?}", output))?;

            println!("Done in {:.2?}", start_time.elapsed());
        }
    }

    Ok(())
}
