//! Shared pipeline fixtures: an in-memory host and a zip package writer.

use h5p_core::error::Result;
use h5p_core::host::{DependencyKind, HostAdapter, LibraryId};
use h5p_core::metadata::ContentMetadata;
use h5p_core::types::{LibraryDescriptor, LibraryUsage, PackageManifest};
use h5p_core::version::Dependency;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub struct PipelineHost {
    pub temp: TempDir,
    next_id: LibraryId,
    pub libraries: HashMap<(String, u32, u32), (LibraryId, LibraryDescriptor)>,
    pub content: HashMap<String, (Value, LibraryId)>,
    pub usage: HashMap<String, Vec<LibraryUsage>>,
}

impl PipelineHost {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            next_id: 1,
            libraries: HashMap::new(),
            content: HashMap::new(),
            usage: HashMap::new(),
        }
    }

    /// Write a package archive at the upload path. Asset files declared
    /// in `preloadedJs`/`preloadedCss` are materialized automatically.
    pub fn upload(&self, entries: &[(&str, Value)]) {
        let file = File::create(self.uploaded_package_path()).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(serde_json::to_string(content).unwrap().as_bytes())
                .unwrap();
            for list in ["preloadedJs", "preloadedCss"] {
                if let Some(files) = content.get(list).and_then(Value::as_array) {
                    let folder = name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
                    for asset in files {
                        let path = asset["path"].as_str().unwrap();
                        zip.start_file(format!("{folder}/{path}"), options).unwrap();
                        zip.write_all(b"/* asset */").unwrap();
                    }
                }
            }
        }
        zip.finish().unwrap();
    }
}

impl HostAdapter for PipelineHost {
    fn uploaded_package_path(&self) -> PathBuf {
        self.temp.path().join("upload.h5p")
    }

    fn uploaded_folder_path(&self) -> PathBuf {
        self.temp.path().join("scratch")
    }

    fn storage_path(&self) -> PathBuf {
        self.temp.path().join("storage")
    }

    fn get_library_id(&self, machine_name: &str, major: u32, minor: u32) -> Option<LibraryId> {
        self.libraries
            .get(&(machine_name.to_string(), major, minor))
            .map(|(id, _)| *id)
    }

    fn is_patched_library(&self, library: &LibraryDescriptor) -> bool {
        self.libraries
            .get(&(
                library.machine_name.clone(),
                library.major_version,
                library.minor_version,
            ))
            .map(|(_, stored)| library.patch_version > stored.patch_version)
            .unwrap_or(false)
    }

    fn save_library_data(&mut self, library: &LibraryDescriptor, new: bool) -> Result<LibraryId> {
        let key = (
            library.machine_name.clone(),
            library.major_version,
            library.minor_version,
        );
        let id = if new {
            self.next_id += 1;
            self.next_id - 1
        } else {
            self.libraries[&key].0
        };
        self.libraries.insert(key, (id, library.clone()));
        Ok(id)
    }

    fn save_library_dependencies(
        &mut self,
        _library_id: LibraryId,
        _kind: DependencyKind,
        _dependencies: &[Dependency],
    ) -> Result<()> {
        Ok(())
    }

    fn delete_library_dependencies(&mut self, _library_id: LibraryId) -> Result<()> {
        Ok(())
    }

    fn load_library(
        &self,
        machine_name: &str,
        major: u32,
        minor: u32,
    ) -> Option<LibraryDescriptor> {
        self.libraries
            .get(&(machine_name.to_string(), major, minor))
            .map(|(_, lib)| lib.clone())
    }

    fn save_content_data(
        &mut self,
        content_id: &str,
        params: &Value,
        _manifest: &PackageManifest,
        _metadata: &ContentMetadata,
        main_library_id: LibraryId,
    ) -> Result<()> {
        self.content
            .insert(content_id.to_string(), (params.clone(), main_library_id));
        Ok(())
    }

    fn copy_content_data(&mut self, source_id: &str, new_id: &str) -> Result<()> {
        let source = self.content[source_id].clone();
        self.content.insert(new_id.to_string(), source);
        Ok(())
    }

    fn delete_content_data(&mut self, content_id: &str) -> Result<()> {
        self.content.remove(content_id);
        Ok(())
    }

    fn save_library_usage(&mut self, content_id: &str, usage: &[LibraryUsage]) -> Result<()> {
        self.usage.insert(content_id.to_string(), usage.to_vec());
        Ok(())
    }

    fn delete_library_usage(&mut self, content_id: &str) -> Result<()> {
        self.usage.remove(content_id);
        Ok(())
    }

    fn copy_library_usage(&mut self, source_id: &str, new_id: &str) -> Result<()> {
        let usage = self.usage.get(source_id).cloned().unwrap_or_default();
        self.usage.insert(new_id.to_string(), usage);
        Ok(())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}
