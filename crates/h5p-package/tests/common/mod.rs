//! Shared test fixtures: an in-memory host adapter and a builder that
//! writes package archives into a temp directory.

use h5p_core::error::{Error, Result};
use h5p_core::host::{DependencyKind, HostAdapter, LibraryId};
use h5p_core::metadata::ContentMetadata;
use h5p_core::types::{LibraryDescriptor, LibraryUsage, PackageManifest};
use h5p_core::version::Dependency;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub struct StoredContent {
    pub params: Value,
    pub title: String,
    pub metadata: ContentMetadata,
    pub main_library_id: LibraryId,
}

/// In-memory host backed by a temp directory.
pub struct MockHost {
    pub temp: TempDir,
    next_id: LibraryId,
    pub libraries: HashMap<(String, u32, u32), (LibraryId, LibraryDescriptor)>,
    pub dependencies: HashMap<LibraryId, Vec<(DependencyKind, Dependency)>>,
    pub content: HashMap<String, StoredContent>,
    pub usage: HashMap<String, Vec<LibraryUsage>>,
    /// When set, `save_library_data` fails, simulating a storage outage
    pub fail_library_saves: bool,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            next_id: 1,
            libraries: HashMap::new(),
            dependencies: HashMap::new(),
            content: HashMap::new(),
            usage: HashMap::new(),
            fail_library_saves: false,
        }
    }

    /// Pre-install a library descriptor as if a previous upload stored it.
    pub fn install(&mut self, library: LibraryDescriptor) -> LibraryId {
        let id = self.next_id;
        self.next_id += 1;
        let key = (
            library.machine_name.clone(),
            library.major_version,
            library.minor_version,
        );
        self.libraries.insert(key, (id, library));
        id
    }

    pub fn stored_patch(&self, machine_name: &str, major: u32, minor: u32) -> Option<u32> {
        self.libraries
            .get(&(machine_name.to_string(), major, minor))
            .map(|(_, lib)| lib.patch_version)
    }
}

impl HostAdapter for MockHost {
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
        self.stored_patch(
            &library.machine_name,
            library.major_version,
            library.minor_version,
        )
        .map(|stored| library.patch_version > stored)
        .unwrap_or(false)
    }

    fn save_library_data(&mut self, library: &LibraryDescriptor, new: bool) -> Result<LibraryId> {
        if self.fail_library_saves {
            return Err(Error::host("library table is unavailable"));
        }
        let key = (
            library.machine_name.clone(),
            library.major_version,
            library.minor_version,
        );
        if new {
            let id = self.next_id;
            self.next_id += 1;
            self.libraries.insert(key, (id, library.clone()));
            Ok(id)
        } else {
            let id = self.libraries[&key].0;
            self.libraries.insert(key, (id, library.clone()));
            Ok(id)
        }
    }

    fn save_library_dependencies(
        &mut self,
        library_id: LibraryId,
        kind: DependencyKind,
        dependencies: &[Dependency],
    ) -> Result<()> {
        let edges = self.dependencies.entry(library_id).or_default();
        for dependency in dependencies {
            edges.push((kind, dependency.clone()));
        }
        Ok(())
    }

    fn delete_library_dependencies(&mut self, library_id: LibraryId) -> Result<()> {
        self.dependencies.remove(&library_id);
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
        manifest: &PackageManifest,
        metadata: &ContentMetadata,
        main_library_id: LibraryId,
    ) -> Result<()> {
        self.content.insert(
            content_id.to_string(),
            StoredContent {
                params: params.clone(),
                title: manifest.title.clone(),
                metadata: metadata.clone(),
                main_library_id,
            },
        );
        Ok(())
    }

    fn copy_content_data(&mut self, source_id: &str, new_id: &str) -> Result<()> {
        let source = &self.content[source_id];
        self.content.insert(
            new_id.to_string(),
            StoredContent {
                params: source.params.clone(),
                title: source.title.clone(),
                metadata: source.metadata.clone(),
                main_library_id: source.main_library_id,
            },
        );
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

/// Builds a package archive at the host's upload path.
pub struct PackageBuilder {
    entries: Vec<(String, String)>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn file(mut self, name: &str, content: &str) -> Self {
        self.entries.push((name.to_string(), content.to_string()));
        self
    }

    pub fn manifest(self, json: &Value) -> Self {
        let text = serde_json::to_string(json).unwrap();
        self.file("h5p.json", &text)
    }

    pub fn content(self, params: &Value) -> Self {
        let text = serde_json::to_string(params).unwrap();
        self.file("content/content.json", &text)
    }

    /// Add a library folder with its manifest and every declared asset.
    pub fn library(mut self, folder: &str, json: &Value) -> Self {
        let text = serde_json::to_string(json).unwrap();
        self = self.file(&format!("{folder}/library.json"), &text);
        for list in ["preloadedJs", "preloadedCss"] {
            if let Some(files) = json.get(list).and_then(Value::as_array) {
                for file in files {
                    let path = file["path"].as_str().unwrap();
                    self = self.file(&format!("{folder}/{path}"), "/* asset */");
                }
            }
        }
        self
    }

    pub fn write(self, path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, content) in &self.entries {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
}

/// A minimal valid package: one runnable library and a content item.
pub fn simple_package(host: &MockHost) {
    PackageBuilder::new()
        .manifest(&serde_json::json!({
            "title": "Greeting Card",
            "language": "en",
            "mainLibrary": "greeting-card",
            "preloadedDependencies": [
                {"machineName": "greeting-card", "majorVersion": 1, "minorVersion": 0}
            ],
            "embedTypes": ["iframe"]
        }))
        .content(&serde_json::json!({"greeting": "Hello world"}))
        .library(
            "greeting-card",
            &serde_json::json!({
                "machineName": "greeting-card",
                "title": "Greeting Card",
                "majorVersion": 1,
                "minorVersion": 0,
                "patchVersion": 4,
                "runnable": true,
                "preloadedJs": [{"path": "greeting-card.js"}]
            }),
        )
        .write(&host.uploaded_package_path());
}
