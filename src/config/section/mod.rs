//! Configuration section definitions.
//!
//! Each module corresponds to a section in `sandpit.toml`:
//!
//! | Module     | TOML Section  | Purpose                                |
//! |------------|---------------|----------------------------------------|
//! | `build`    | `[build]`     | Entry pattern, debounce, output        |
//! | `resolve`  | `[resolve]`   | CDN origin and internal specifiers     |
//! | `template` | `[template]`  | External template compiler command     |

mod build;
mod resolve;
mod template;

pub use build::BuildConfig;
pub use resolve::ResolveSection;
pub use template::TemplateConfig;
