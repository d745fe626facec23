use crate::analysis::orchestrator::{DiagnosticSink, FrameAssignment};
use crate::analysis::reconstruct::LongBond;
use crate::core::structure::{Frame, PeriodicCell};
use crate::error::Result;
use crate::AssignConfig;
use nalgebra::Vector3;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Label used for bond centers in augmented XYZ output.
pub const BOND_CENTER_LABEL: &str = "He";
/// Label used for Wannier centers in augmented XYZ output.
pub const WANNIER_CENTER_LABEL: &str = "X";

fn header(cell: &PeriodicCell, comment: &str) -> String {
    let lattice = cell
        .lattice
        .rows()
        .iter()
        .flatten()
        .map(|v| format!("{:.8}", v))
        .collect::<Vec<_>>()
        .join(" ");
    let pbc = cell
        .pbc
        .iter()
        .map(|&p| if p { "T" } else { "F" })
        .collect::<Vec<_>>()
        .join(" ");
    format!("Lattice=\"{}\" pbc=\"{}\" {}", lattice, pbc, comment)
}

fn write_block<W: Write>(
    out: &mut W,
    cell: &PeriodicCell,
    comment: &str,
    records: &[(&str, Vector3<f64>)],
) -> std::io::Result<()> {
    writeln!(out, "{}", records.len())?;
    writeln!(out, "{}", header(cell, comment))?;
    for (label, r) in records {
        writeln!(out, "{:<3} {:>16.8} {:>16.8} {:>16.8}", label, r.x, r.y, r.z)?;
    }
    Ok(())
}

/// Appends the frame's atoms as one XYZ block to `path`.
pub fn append_xyz(path: &Path, frame: &Frame, comment: &str) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut out = BufWriter::new(file);
    let records: Vec<(&str, Vector3<f64>)> = frame
        .atoms
        .iter()
        .map(|a| (a.element.as_str(), a.position))
        .collect();
    write_block(&mut out, &frame.cell, comment, &records)?;
    out.flush()?;
    Ok(())
}

/// Writes reconstructed atoms, bond centers and claimed Wannier centers,
/// molecule by molecule, appending one block per call.
pub fn append_augmented_xyz(path: &Path, frame: &Frame, assignment: &FrameAssignment, comment: &str) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut out = BufWriter::new(file);

    let per_molecule = frame.atoms.len() / assignment.molecules.len().max(1);
    let mut records: Vec<(&str, Vector3<f64>)> = Vec::new();
    for molecule in &assignment.molecules {
        let atoms = frame.molecule(molecule.index, per_molecule);
        for (atom, r) in atoms.iter().zip(&molecule.positions) {
            records.push((atom.element.as_str(), *r));
        }
        for r in &molecule.bond_centers {
            records.push((BOND_CENTER_LABEL, *r));
        }
        let wcs = molecule
            .oxygen_lone_pairs
            .iter()
            .chain(&molecule.nitrogen_lone_pairs)
            .map(|l| &l.assignment)
            .chain(molecule.bonds.iter().map(|b| &b.assignment))
            .chain(molecule.pi_bonds.iter().map(|p| &p.assignment));
        for a in wcs {
            for r in &a.wc_positions {
                records.push((WANNIER_CENTER_LABEL, *r));
            }
        }
    }
    write_block(&mut out, &frame.cell, comment, &records)?;
    out.flush()?;
    Ok(())
}

// ============================================================================
// DIAGNOSTIC DUMP
// ============================================================================

/// Appends every frame with an unresolved molecule to an XYZ trajectory.
pub struct XyzDump {
    path: PathBuf,
    lock: Mutex<()>,
}

impl XyzDump {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DiagnosticSink for XyzDump {
    fn record_unresolved(&self, frame: &Frame, molecule: usize, long_bonds: &[LongBond]) -> Result<()> {
        let bonds: Vec<String> = long_bonds
            .iter()
            .map(|b| format!("{}:{:.3}", b.bond, b.length))
            .collect();
        let comment = format!("unresolved_molecule={} long_bonds={}", molecule, bonds.join(","));
        // A poisoned lock only means another writer panicked mid-append
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        append_xyz(&self.path, frame, &comment)
    }
}

// ============================================================================
// JSON RESULTS
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FrameReport<'a> {
    pub source: String,
    pub frame: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_dipole: Option<Vector3<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub molecule_dipoles: Option<Vec<Vector3<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<&'a FrameAssignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> FrameReport<'a> {
    pub fn success(source: impl Into<String>, frame: usize, assignment: &'a FrameAssignment) -> Self {
        Self {
            source: source.into(),
            frame,
            total_dipole: Some(assignment.total_dipole()),
            molecule_dipoles: Some(assignment.molecule_dipoles()),
            assignment: Some(assignment),
            error: None,
        }
    }

    pub fn failure(source: impl Into<String>, frame: usize, error: String) -> Self {
        Self {
            source: source.into(),
            frame,
            total_dipole: None,
            molecule_dipoles: None,
            assignment: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultDocument<'a> {
    pub config: &'a AssignConfig,
    pub frames: Vec<FrameReport<'a>>,
}

pub fn to_json(document: &ResultDocument<'_>, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, document)?;
    out.flush()?;
    Ok(())
}
