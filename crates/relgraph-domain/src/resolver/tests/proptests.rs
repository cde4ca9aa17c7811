//! Property tests over randomly generated tuple sets for the document model.

use proptest::prelude::*;

use super::fixtures::{allowed, document_model, Resolver};
use super::mocks::{create_resolver, MockTupleReader};
use crate::resolver::{ListObjectsRequest, ListObjectsStrategy};

const USERS: [&str; 3] = ["user:alice", "user:bob", "user:carol"];
const DOCUMENTS: [&str; 4] = ["document:d0", "document:d1", "document:d2", "document:d3"];

type Tuple = (String, String, String);

/// One tuple drawn from a small universe so that paths actually connect.
fn tuple_strategy() -> impl Strategy<Value = Tuple> {
    let user = prop::sample::select(USERS.to_vec()).prop_map(str::to_string);
    let document = prop::sample::select(DOCUMENTS.to_vec()).prop_map(str::to_string);
    let group = prop::sample::select(vec!["group:g0", "group:g1"]).prop_map(str::to_string);
    let folder = prop::sample::select(vec!["folder:f0", "folder:f1"]).prop_map(str::to_string);
    let document_user_relation =
        prop::sample::select(vec!["owner", "blocked", "approved", "editor", "viewer"]);

    prop_oneof![
        (document.clone(), document_user_relation, user.clone())
            .prop_map(|(o, r, u)| (o, r.to_string(), u)),
        (document.clone(), group.clone())
            .prop_map(|(o, g)| (o, "viewer".to_string(), format!("{g}#member"))),
        document
            .clone()
            .prop_map(|o| (o, "viewer".to_string(), "user:*".to_string())),
        (document, folder.clone()).prop_map(|(o, f)| (o, "parent".to_string(), f)),
        (group.clone(), user.clone()).prop_map(|(g, u)| (g, "member".to_string(), u)),
        (group.clone(), group.clone())
            .prop_map(|(g, h)| (g, "member".to_string(), format!("{h}#member"))),
        (folder.clone(), user).prop_map(|(f, u)| (f, "viewer".to_string(), u)),
        (folder.clone(), group).prop_map(|(f, g)| (f, "viewer".to_string(), format!("{g}#member"))),
        (folder.clone(), folder).prop_map(|(f, p)| (f, "parent".to_string(), p)),
    ]
}

async fn seeded(tuples: &[Tuple]) -> (std::sync::Arc<MockTupleReader>, Resolver) {
    let (reader, _, resolver) = create_resolver(document_model()).await;
    for (object, relation, user) in tuples {
        reader.add(object, relation, user).await;
    }
    (reader, resolver)
}

async fn check(resolver: &Resolver, user: &str, relation: &str, object: &str) -> bool {
    allowed(resolver, user, relation, object)
        .await
        .expect("generated models never fail")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// `restricted_viewer` is exactly `reader` minus `blocked`, and
    /// `approved_viewer` exactly `reader` and `approved`.
    #[test]
    fn test_property_set_operators_match_their_definitions(
        tuples in prop::collection::vec(tuple_strategy(), 0..24),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let mismatches = rt.block_on(async {
            let (_, resolver) = seeded(&tuples).await;
            let mut mismatches = Vec::new();
            for user in USERS {
                for object in DOCUMENTS {
                    let reader = check(&resolver, user, "reader", object).await;
                    let blocked = check(&resolver, user, "blocked", object).await;
                    let approved = check(&resolver, user, "approved", object).await;
                    if check(&resolver, user, "restricted_viewer", object).await != (reader && !blocked) {
                        mismatches.push(format!("restricted_viewer {user} {object}"));
                    }
                    if check(&resolver, user, "approved_viewer", object).await != (reader && approved) {
                        mismatches.push(format!("approved_viewer {user} {object}"));
                    }
                }
            }
            mismatches
        });
        prop_assert!(mismatches.is_empty(), "mismatches: {:?}", mismatches);
    }

    /// Adding a tuple never revokes a relation built only from unions.
    #[test]
    fn test_property_union_relations_are_monotonic(
        tuples in prop::collection::vec(tuple_strategy(), 0..20),
        extra in tuple_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let revoked = rt.block_on(async {
            let (reader, resolver) = seeded(&tuples).await;
            let mut before = Vec::new();
            for user in USERS {
                for object in DOCUMENTS {
                    before.push((user, object, check(&resolver, user, "reader", object).await));
                }
            }

            reader.add(&extra.0, &extra.1, &extra.2).await;

            let mut revoked = Vec::new();
            for (user, object, was_allowed) in before {
                if was_allowed && !check(&resolver, user, "reader", object).await {
                    revoked.push(format!("{user} {object}"));
                }
            }
            revoked
        });
        prop_assert!(revoked.is_empty(), "revoked: {:?}", revoked);
    }

    /// Both ListObjects strategies return exactly the objects Check allows.
    #[test]
    fn test_property_list_objects_matches_check(
        tuples in prop::collection::vec(tuple_strategy(), 0..24),
        relation in prop::sample::select(vec!["viewer", "reader", "restricted_viewer", "approved_viewer"]),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let disagreements = rt.block_on(async {
            let (_, resolver) = seeded(&tuples).await;
            let mut disagreements = Vec::new();
            for user in USERS {
                let mut expected = Vec::new();
                for object in DOCUMENTS {
                    if check(&resolver, user, relation, object).await {
                        expected.push(object.to_string());
                    }
                }
                for strategy in [ListObjectsStrategy::Forward, ListObjectsStrategy::Reverse] {
                    let listed = resolver
                        .list_objects(
                            &ListObjectsRequest::new(user, relation, "document").with_strategy(strategy),
                        )
                        .await
                        .expect("generated models never fail")
                        .objects;
                    if listed != expected {
                        disagreements.push(format!("{strategy:?} {user} {relation}: {listed:?} != {expected:?}"));
                    }
                }
            }
            disagreements
        });
        prop_assert!(disagreements.is_empty(), "{:?}", disagreements);
    }

    /// Repeated checks over the same tuples give the same answer.
    #[test]
    fn test_property_check_is_deterministic(
        tuples in prop::collection::vec(tuple_strategy(), 0..24),
        user in prop::sample::select(USERS.to_vec()),
        object in prop::sample::select(DOCUMENTS.to_vec()),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let answers = rt.block_on(async {
            let (_, resolver) = seeded(&tuples).await;
            let mut answers = Vec::new();
            for _ in 0..5 {
                answers.push(allowed(&resolver, user, "restricted_viewer", object).await);
            }
            answers
        });
        prop_assert!(answers.windows(2).all(|pair| pair[0] == pair[1]), "{:?}", answers);
    }
}
