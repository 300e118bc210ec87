//! Shared constants.

/// Project configuration file looked up at the project root.
pub const CONFIG_FILENAME: &str = "twinpack.json";

/// Package metadata file of the consuming package.
pub const PACKAGE_JSON: &str = "package.json";

/// Default output directory, relative to the project root.
pub const DEFAULT_OUT_DIR: &str = "dist";

/// Default glob pattern for directory discovery.
pub const DEFAULT_PATTERN: &str = "**";

/// Default prefix of project-root aliased specifiers (`~/libs/a/thing`).
pub const DEFAULT_ALIAS_PREFIX: &str = "~/";

/// Directory (inside a library's output) that receives copied out-of-tree files.
pub const DEFAULT_SIDE_DIR: &str = "_external";

/// Maximum number of in-flight file operations per fan-out.
pub const DEFAULT_FILE_CONCURRENCY: usize = 32;

/// Directory names never descended into during discovery.
pub const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "coverage", ".cache", ".turbo", ".nyc_output"];

/// Sentinel opening a region of inlined content the linker must not rescan.
pub const INLINE_START_SENTINEL: &str = "/* twinpack:inline-start";

/// Sentinel closing an inlined region.
pub const INLINE_END_SENTINEL: &str = "/* twinpack:inline-end */";

/// Node.js core modules; treated as externals with or without the `node:` prefix.
pub const NODE_BUILTINS: &[&str] = &[
  "assert",
  "assert/strict",
  "async_hooks",
  "buffer",
  "child_process",
  "cluster",
  "console",
  "constants",
  "crypto",
  "dgram",
  "diagnostics_channel",
  "dns",
  "dns/promises",
  "domain",
  "events",
  "fs",
  "fs/promises",
  "http",
  "http2",
  "https",
  "inspector",
  "module",
  "net",
  "os",
  "path",
  "path/posix",
  "path/win32",
  "perf_hooks",
  "process",
  "punycode",
  "querystring",
  "readline",
  "readline/promises",
  "repl",
  "stream",
  "stream/promises",
  "stream/web",
  "string_decoder",
  "sys",
  "timers",
  "timers/promises",
  "tls",
  "trace_events",
  "tty",
  "url",
  "util",
  "util/types",
  "v8",
  "vm",
  "wasi",
  "worker_threads",
  "zlib",
];

/// Returns true if `specifier` names a Node.js core module.
pub fn is_node_builtin(specifier: &str) -> bool {
  if specifier.starts_with("node:") {
    return true;
  }
  NODE_BUILTINS.contains(&specifier)
}
