//! Identifiers and the seeded generator used for prefab clones.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Fresh random id (for editor-created entities).
            pub fn random() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Beatmap or background object id.
    ObjectId
);
string_id!(
    /// Prefab template id.
    PrefabId
);

/// Prefix reserved for the runtime keys of nested prefab runners.
pub const PREFAB_RUNNER_PREFIX: &str = "prefab-runner:";

impl ObjectId {
    /// Runtime key of the nested runner for `instance`.
    ///
    /// Authored ids carrying [`PREFAB_RUNNER_PREFIX`] are rejected on load and insert.
    pub fn prefab_runner(instance: &InstanceId) -> Self {
        Self(format!("{PREFAB_RUNNER_PREFIX}{instance}"))
    }

    pub fn is_reserved(&self) -> bool {
        self.0.starts_with(PREFAB_RUNNER_PREFIX)
    }
}
string_id!(
    /// Placed prefab instance id.
    InstanceId
);

/// Deterministic id source for prefab expansion.
///
/// Ids are UUIDv5 names under a namespace derived from the global seed, so the same
/// (template entity, instance, repetition, seed) always maps to the same id and anything else
/// maps somewhere else.
#[derive(Clone, Debug)]
pub struct IdSeeder {
    seed: u64,
    namespace: Uuid,
}

impl IdSeeder {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            namespace: Uuid::new_v5(&Uuid::NAMESPACE_OID, &seed.to_le_bytes()),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Id for the clone of `template_object` in `repetition` of `instance`.
    pub fn object_id(
        &self,
        template_object: &ObjectId,
        instance: &InstanceId,
        repetition: u32,
    ) -> ObjectId {
        ObjectId(self.derive("object", template_object.as_str(), instance.as_str(), repetition))
    }

    /// Id for the clone of a nested prefab instance in `repetition` of `instance`.
    pub fn instance_id(
        &self,
        template_instance: &InstanceId,
        instance: &InstanceId,
        repetition: u32,
    ) -> InstanceId {
        InstanceId(self.derive(
            "instance",
            template_instance.as_str(),
            instance.as_str(),
            repetition,
        ))
    }

    fn derive(&self, kind: &str, source: &str, owner: &str, repetition: u32) -> String {
        // length prefixes keep ("a:b", "c") and ("a", "b:c") apart
        let name = format!(
            "{kind}/{}:{source}/{}:{owner}/{repetition}",
            source.len(),
            owner.len()
        );
        Uuid::new_v5(&self.namespace, name.as_bytes())
            .simple()
            .to_string()
    }
}

impl Default for IdSeeder {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_id() {
        let a = IdSeeder::new(7);
        let b = IdSeeder::new(7);
        let obj = ObjectId::from("tmpl-obj");
        let inst = InstanceId::from("inst");
        assert_eq!(a.object_id(&obj, &inst, 0), b.object_id(&obj, &inst, 0));
    }

    #[test]
    fn repetition_instance_and_seed_all_matter() {
        let s = IdSeeder::new(7);
        let obj = ObjectId::from("tmpl-obj");
        let inst = InstanceId::from("inst");
        let base = s.object_id(&obj, &inst, 0);
        assert_ne!(base, s.object_id(&obj, &inst, 1));
        assert_ne!(base, s.object_id(&obj, &InstanceId::from("other"), 0));
        assert_ne!(base, IdSeeder::new(8).object_id(&obj, &inst, 0));
        assert_ne!(
            base.0,
            s.instance_id(&InstanceId::from("tmpl-obj"), &inst, 0).0
        );
    }

    #[test]
    fn separators_do_not_alias() {
        let s = IdSeeder::default();
        let x = s.object_id(&ObjectId::from("a:b"), &InstanceId::from("c"), 0);
        let y = s.object_id(&ObjectId::from("a"), &InstanceId::from("b:c"), 0);
        assert_ne!(x, y);
    }

    #[test]
    fn runner_keys_are_reserved() {
        let key = ObjectId::prefab_runner(&InstanceId::from("pulses"));
        assert_ne!(key, ObjectId::from("pulses"));
        assert!(key.is_reserved());
        assert!(!ObjectId::from("pulses").is_reserved());
        assert!(!IdSeeder::new(3)
            .object_id(&ObjectId::from("ring"), &InstanceId::from("pulses"), 0)
            .is_reserved());
    }
}
