use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Class of a user-management object.
///
/// The high 16 bits select the type (user, distribution list, container) and the low 16 bits the
/// concrete class. A value whose low half is zero is an "is-type" wildcard that matches every
/// concrete class of that type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectClass(pub u32);

impl ObjectClass {
    pub const UNKNOWN: ObjectClass = ObjectClass(0);
    pub const USER: ObjectClass = ObjectClass(0x0001_0000);
    pub const ACTIVE_USER: ObjectClass = ObjectClass(0x0001_0001);
    pub const NONACTIVE_USER: ObjectClass = ObjectClass(0x0001_0002);
    pub const NONACTIVE_ROOM: ObjectClass = ObjectClass(0x0001_0003);
    pub const NONACTIVE_EQUIPMENT: ObjectClass = ObjectClass(0x0001_0004);
    pub const NONACTIVE_CONTACT: ObjectClass = ObjectClass(0x0001_0005);
    pub const DISTLIST: ObjectClass = ObjectClass(0x0003_0000);
    pub const DISTLIST_GROUP: ObjectClass = ObjectClass(0x0003_0001);
    pub const DISTLIST_SECURITY: ObjectClass = ObjectClass(0x0003_0002);
    pub const DISTLIST_DYNAMIC: ObjectClass = ObjectClass(0x0003_0003);
    pub const CONTAINER: ObjectClass = ObjectClass(0x0004_0000);
    pub const CONTAINER_COMPANY: ObjectClass = ObjectClass(0x0004_0001);
    pub const CONTAINER_ADDRESSLIST: ObjectClass = ObjectClass(0x0004_0002);

    /// Whether this is a wildcard type rather than a concrete class.
    #[inline]
    pub const fn is_type(self) -> bool {
        self.0 & 0xFFFF == 0
    }

    #[inline]
    pub const fn type_of(self) -> ObjectClass {
        ObjectClass(self.0 & 0xFFFF_0000)
    }

    /// Whether `concrete` satisfies this class, honouring wildcards.
    pub fn matches(self, concrete: ObjectClass) -> bool {
        if self == ObjectClass::UNKNOWN {
            return true;
        }
        if self.is_type() {
            return concrete.type_of() == self;
        }
        self == concrete
    }
}

impl fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectClass({:#010x})", self.0)
    }
}

/// Identity of a principal as known to the user-management plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalId {
    pub class: ObjectClass,
    pub id: Vec<u8>,
}

impl ExternalId {
    pub fn new(class: ObjectClass, id: impl Into<Vec<u8>>) -> Self {
        Self {
            class,
            id: id.into(),
        }
    }
}

/// Forward user identity: what an internal user/company id resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserObject {
    pub class: ObjectClass,
    pub company: u32,
    pub external_id: Vec<u8>,
    pub signature: String,
}

impl UserObject {
    pub fn external(&self) -> ExternalId {
        ExternalId::new(self.class, self.external_id.clone())
    }
}

/// Reverse user identity: what an external id resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: u32,
    pub company: u32,
    pub signature: String,
}

/// Resolved profile of a user, group or company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub class: Option<ObjectClass>,
    pub props: BTreeMap<String, String>,
    pub mv_props: BTreeMap<String, Vec<String>>,
}

impl UserDetails {
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }

    pub fn set_prop(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.props.insert(name.into(), value.into());
    }
}

/// Connection details of a server in a multi-server deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDetails {
    pub host_address: String,
    pub file_path: String,
    pub http_path: String,
    pub ssl_path: String,
    pub proxy_path: String,
}

/// One access control entry on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclEntry {
    pub principal: u32,
    pub right_type: u32,
    pub mask: u32,
}

/// Store size thresholds for a principal (or the company default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaEntry {
    pub use_default: bool,
    pub is_company_default: bool,
    pub warn_size: i64,
    pub soft_size: i64,
    pub hard_size: i64,
}
