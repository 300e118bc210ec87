//! External module inference.

use std::collections::BTreeSet;

use crate::consts::NODE_BUILTINS;
use crate::package::PackageJson;

/// Host built-ins (bare and `node:`-prefixed), configured externals and every
/// declared dependency of the package.
pub fn infer_externals(configured: &[String], package: &PackageJson) -> BTreeSet<String> {
  let mut externals: BTreeSet<String> = NODE_BUILTINS
    .iter()
    .flat_map(|name| [name.to_string(), format!("node:{}", name)])
    .collect();
  externals.extend(configured.iter().cloned());
  externals.extend(package.all_dependency_names());
  externals
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;

  #[test]
  fn externals_cover_builtins_config_and_dependencies() {
    let package = PackageJson {
      dependencies: BTreeMap::from([("defu".to_string(), "^6".to_string())]),
      peer_dependencies: BTreeMap::from([("react".to_string(), "^19".to_string())]),
      dev_dependencies: BTreeMap::from([("vitest".to_string(), "^3".to_string())]),
      ..Default::default()
    };
    let externals = infer_externals(&["virtual:config".to_string()], &package);

    for name in ["fs", "node:fs", "defu", "react", "vitest", "virtual:config"] {
      assert!(externals.contains(name), "missing {}", name);
    }
  }
}
