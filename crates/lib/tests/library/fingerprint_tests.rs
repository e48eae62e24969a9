//! Fingerprint properties of parsed applications.

use proptest::prelude::*;

use pullstack_lib::config::Config;

fn render(name: &str, env: &[(String, String)]) -> String {
  let mut yaml = format!(
    "applications:\n  - name: \"{}\"\n    source: /srv/pkg.tar.gz\n    service:\n      command: [run]\n      environment:\n",
    name
  );
  for (key, value) in env {
    yaml.push_str(&format!("        \"{}\": \"{}\"\n", key, value));
  }
  yaml
}

fn env_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
  prop::collection::btree_map("[A-Z][A-Z0-9_]{0,8}", "[a-z0-9]{0,8}", 1..8)
    .prop_map(|map| map.into_iter().collect())
}

proptest! {
  #[test]
  fn key_order_does_not_change_fingerprint(env in env_strategy()) {
    let mut reversed = env.clone();
    reversed.reverse();

    let forward = Config::parse(&render("app", &env)).unwrap();
    let backward = Config::parse(&render("app", &reversed)).unwrap();
    prop_assert_eq!(
      forward.applications[0].content_fingerprint().unwrap(),
      backward.applications[0].content_fingerprint().unwrap()
    );
  }

  #[test]
  fn different_names_give_different_fingerprints(env in env_strategy(), a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
    prop_assume!(a != b);
    let first = Config::parse(&render(&a, &env)).unwrap();
    let second = Config::parse(&render(&b, &env)).unwrap();
    prop_assert_ne!(
      first.applications[0].content_fingerprint().unwrap(),
      second.applications[0].content_fingerprint().unwrap()
    );
    prop_assert_eq!(
      first.applications[0].source_fingerprint().unwrap(),
      second.applications[0].source_fingerprint().unwrap()
    );
  }
}
