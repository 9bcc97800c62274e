//! Starter project written by `sandpit init`.

use crate::vfs::{FileError, FileSet, VirtualFile};

pub const ENTRY: &str = "index.js";

/// Version of the `ix` runtime the starter model imports.
pub const RUNTIME_VERSION: &str = "0.1.0-alpha.7";

/// Starter files in the order they are shown.
pub fn files() -> [(&'static str, String); 3] {
    [
        (
            ENTRY,
            "import Main from 'main.ix';\n\nnew Main().insert(document.body);\n".to_string(),
        ),
        (
            "main.ix",
            "using model from 'main.model.js'\n\n<p>Hello {name} 👋</p>\n".to_string(),
        ),
        (
            "main.model.js",
            format!(
                "import {{ ViewModel }} from 'https://cdn.skypack.dev/ix@{RUNTIME_VERSION}';\n\n\
                 export default class MainViewModel extends ViewModel {{\n  name = 'ix';\n}}\n"
            ),
        ),
    ]
}

/// The starter project as a fresh store.
pub fn project() -> Result<FileSet, FileError> {
    let set = FileSet::new();
    for (name, content) in files() {
        set.add(VirtualFile::new(name, content)?);
    }
    Ok(set)
}
