//! Azure resource kinds the provisioning run can create, with their `az`
//! command lines and naming rules.

use crate::util::sha256_hex;
use serde::{Deserialize, Serialize};
use std::fmt;

const SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    KeyVault,
    StorageAccount,
    EventHubsNamespace,
}

#[derive(Debug, Clone, Copy)]
struct NameRules {
    min_len: usize,
    max_len: usize,
    hyphens: bool,
    letter_first: bool,
    fallback: &'static str,
}

impl ResourceKind {
    fn rules(self) -> NameRules {
        match self {
            ResourceKind::KeyVault => NameRules {
                min_len: 3,
                max_len: 24,
                hyphens: true,
                letter_first: true,
                fallback: "kv",
            },
            ResourceKind::StorageAccount => NameRules {
                min_len: 3,
                max_len: 24,
                hyphens: false,
                letter_first: false,
                fallback: "st",
            },
            ResourceKind::EventHubsNamespace => NameRules {
                min_len: 6,
                max_len: 50,
                hyphens: true,
                letter_first: true,
                fallback: "ehns",
            },
        }
    }

    fn az_group(self) -> &'static [&'static str] {
        match self {
            ResourceKind::KeyVault => &["keyvault"],
            ResourceKind::StorageAccount => &["storage", "account"],
            ResourceKind::EventHubsNamespace => &["eventhubs", "namespace"],
        }
    }

    fn state_query(self) -> &'static str {
        match self {
            ResourceKind::KeyVault => "properties.provisioningState",
            ResourceKind::StorageAccount | ResourceKind::EventHubsNamespace => {
                "provisioningState"
            }
        }
    }

    /// `az ... show` arguments printing only the provisioning state.
    pub fn show_args(self, name: &str, resource_group: &str) -> Vec<String> {
        let mut args = strings(self.az_group());
        args.extend(strings(&["show", "--name", name, "--resource-group", resource_group]));
        args.extend(strings(&["--query", self.state_query(), "-o", "tsv"]));
        args
    }

    pub fn create_args(self, name: &str, resource_group: &str, location: &str) -> Vec<String> {
        let mut args = strings(self.az_group());
        args.extend(strings(&[
            "create",
            "--name",
            name,
            "--resource-group",
            resource_group,
            "--location",
            location,
        ]));
        let extra: &[&str] = match self {
            ResourceKind::KeyVault => &["--enable-rbac-authorization", "true"],
            ResourceKind::StorageAccount => &[
                "--sku",
                "Standard_LRS",
                "--kind",
                "StorageV2",
                "--enable-hierarchical-namespace",
                "true",
            ],
            ResourceKind::EventHubsNamespace => &["--sku", "Standard"],
        };
        args.extend(strings(extra));
        args.extend(strings(&["-o", "none"]));
        args
    }

    /// Name to try on the given attempt. Attempt 0 is the sanitized base
    /// name; later attempts append a short suffix derived from the base.
    pub fn candidate_name(self, base: &str, attempt: u32) -> String {
        let rules = self.rules();
        let stem = self.sanitize(base);
        if attempt == 0 {
            return stem;
        }

        let digest = sha256_hex(format!("{base}:{attempt}").as_bytes());
        let suffix = &digest[..SUFFIX_LEN];
        let sep = if rules.hyphens { "-" } else { "" };
        let room = rules.max_len - SUFFIX_LEN - sep.len();
        let stem: String = stem.chars().take(room).collect();
        let stem = stem.trim_end_matches('-');
        format!("{stem}{sep}{suffix}")
    }

    pub fn sanitize(self, raw: &str) -> String {
        let rules = self.rules();
        let mut out = String::new();
        for c in raw.trim().chars() {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() {
                out.push(c);
            } else if rules.hyphens
                && matches!(c, '-' | '_' | '.' | ' ')
                && !out.is_empty()
                && !out.ends_with('-')
            {
                out.push('-');
            }
        }

        let mut out = if rules.letter_first {
            out.trim_start_matches(|c: char| !c.is_ascii_alphabetic())
                .to_string()
        } else {
            out
        };
        if out.is_empty() {
            out = rules.fallback.to_string();
        }
        out.truncate(rules.max_len);
        let mut out = out.trim_end_matches('-').to_string();

        if out.len() < rules.min_len {
            let pad = sha256_hex(raw.as_bytes());
            let need = rules.min_len - out.len();
            out.push_str(&pad[..need]);
        }
        out
    }

    /// Whether `name` satisfies the naming rules for this kind.
    pub fn is_valid_name(self, name: &str) -> bool {
        let rules = self.rules();
        let len_ok = (rules.min_len..=rules.max_len).contains(&name.len());
        let chars_ok = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || (rules.hyphens && c == '-'));
        let first_ok = !rules.letter_first || name.starts_with(|c: char| c.is_ascii_alphabetic());
        let last_ok = !name.ends_with('-');
        len_ok && chars_ok && first_ok && last_ok && !name.contains("--")
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::KeyVault => "key_vault",
            ResourceKind::StorageAccount => "storage_account",
            ResourceKind::EventHubsNamespace => "event_hubs_namespace",
        };
        f.write_str(s)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
