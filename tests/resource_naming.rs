use arc_readiness::resource::ResourceKind;

const KINDS: [ResourceKind; 3] = [
    ResourceKind::KeyVault,
    ResourceKind::StorageAccount,
    ResourceKind::EventHubsNamespace,
];

#[test]
fn first_candidate_is_sanitized_base() {
    assert_eq!(ResourceKind::StorageAccount.candidate_name("St-Edge_Lab", 0), "stedgelab");
    assert_eq!(ResourceKind::KeyVault.candidate_name("KV_Edge Lab", 0), "kv-edge-lab");
    assert_eq!(ResourceKind::KeyVault.candidate_name("9-vault", 0), "vault");
}

#[test]
fn later_candidates_are_distinct_and_deterministic() {
    for kind in KINDS {
        let names: Vec<String> = (0..4).map(|i| kind.candidate_name("edge-lab", i)).collect();
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b, "{kind}: duplicate candidate");
            }
        }
        assert_eq!(names[2], kind.candidate_name("edge-lab", 2));
    }
}

#[test]
fn candidates_respect_naming_rules() {
    let bases = [
        "a",
        "x",
        "---",
        "Edge Lab Vault For The Factory Floor In Building Seven",
        "storage.account.with.dots",
        "1234567890123456789012345678901234567890",
    ];
    for kind in KINDS {
        for base in bases {
            for attempt in 0..3 {
                let name = kind.candidate_name(base, attempt);
                assert!(
                    kind.is_valid_name(&name),
                    "{kind}: {name:?} from {base:?} attempt {attempt}"
                );
            }
        }
    }
}

#[test]
fn show_args_query_provisioning_state() {
    let args = ResourceKind::KeyVault.show_args("kv1", "rg1");
    assert_eq!(&args[..2], ["keyvault", "show"]);
    assert!(args.contains(&"properties.provisioningState".to_string()));

    let args = ResourceKind::StorageAccount.show_args("st1", "rg1");
    assert_eq!(&args[..3], ["storage", "account", "show"]);
    assert!(args.contains(&"provisioningState".to_string()));
}

#[test]
fn create_args_carry_location_and_kind_flags() {
    let args = ResourceKind::EventHubsNamespace.create_args("ehns1", "rg1", "westeurope");
    assert_eq!(&args[..3], ["eventhubs", "namespace", "create"]);
    let loc = args.iter().position(|a| a == "--location").unwrap();
    assert_eq!(args[loc + 1], "westeurope");
    assert!(args.contains(&"Standard".to_string()));
}
