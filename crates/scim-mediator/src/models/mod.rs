//! SCIM 2.0 wire schema (RFC 7643 / RFC 7644) as spoken by the remote directory.

pub mod scim_group;
pub mod scim_response;
pub mod scim_user;

pub use scim_group::ScimGroup;
pub use scim_response::{PatchOperation, ScimListResponse, ScimPatchOp, ScimPatchRequest};
pub use scim_user::{EnterpriseUserExtension, ScimEmail, ScimName, ScimUser};
