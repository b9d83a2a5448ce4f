//! Macro expansion backends for the transpiler.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::compiler::error::TranspileError;
use crate::compiler::shader::ShaderStage;
use crate::compiler::shader::scan::insert_after_prologue;

/// Expands `#include`, `#define` and `#if` in one shader stage.
pub trait TextPreprocessor {
    fn preprocess(
        &self,
        source: &str,
        stage: ShaderStage,
        defines: &BTreeMap<String, i32>,
    ) -> Result<String, TranspileError>;
}

/// Runs `glslc -E <file> -I <include_dir> -DNAME=V ...`.
pub struct GlslcPreprocessor {
    program: PathBuf,
    include_dir: PathBuf,
    scratch_dir: PathBuf,
    next_file: AtomicU64,
}

impl GlslcPreprocessor {
    pub fn new(include_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("glslc"),
            include_dir: include_dir.into(),
            scratch_dir: std::env::temp_dir(),
            next_file: AtomicU64::new(0),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn scratch_path(&self, stage: ShaderStage) -> PathBuf {
        let n = self.next_file.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir.join(format!(
            "wallpaper-pass-compiler-{}-{n}.{}",
            std::process::id(),
            stage.extension()
        ))
    }
}

impl TextPreprocessor for GlslcPreprocessor {
    fn preprocess(
        &self,
        source: &str,
        stage: ShaderStage,
        defines: &BTreeMap<String, i32>,
    ) -> Result<String, TranspileError> {
        let fail = |diagnostic: String| TranspileError::Preprocessor { stage, diagnostic };

        let path = self.scratch_path(stage);
        fs::write(&path, source)
            .map_err(|e| fail(format!("cannot write {}: {e}", path.display())))?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("-E").arg(&path).arg("-I").arg(&self.include_dir);
        for (name, value) in defines {
            cmd.arg(format!("-D{name}={value}"));
        }
        log::debug!("running {:?}", cmd);
        let output = cmd.output();
        let _ = fs::remove_file(&path);

        let output = output.map_err(|e| fail(format!("cannot run {}: {e}", self.program.display())))?;
        if !output.status.success() {
            let mut diagnostic = String::from_utf8_lossy(&output.stderr).into_owned();
            diagnostic.push_str(&String::from_utf8_lossy(&output.stdout));
            return Err(fail(diagnostic.trim_end().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Leaves the text alone apart from materialising the combos as `#define`
/// lines after the prologue. Used in tests and when `glslc` is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughPreprocessor;

impl TextPreprocessor for PassThroughPreprocessor {
    fn preprocess(
        &self,
        source: &str,
        _stage: ShaderStage,
        defines: &BTreeMap<String, i32>,
    ) -> Result<String, TranspileError> {
        let block: String = defines
            .iter()
            .map(|(name, value)| format!("#define {name} {value}\n"))
            .collect();
        Ok(insert_after_prologue(source, &block))
    }
}
