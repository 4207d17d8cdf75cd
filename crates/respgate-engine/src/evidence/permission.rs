use std::sync::Arc;

use async_trait::async_trait;

use respgate_core::errors::ProviderError;
use respgate_core::evidence::{EvidencePayload, PermissionEvidence};
use respgate_core::reference::ReferenceData;
use respgate_core::request::GateContext;
use respgate_core::traits::EvidenceProvider;
use respgate_core::types::{ActionType, ProviderKind};

pub const PERMISSION_OK: &str = "PERMISSION_OK";
pub const ERR_ACTION_RESTRICTED: &str = "ERR_IAM_ACTION_RESTRICTED";
pub const ERR_UNKNOWN_ROLE: &str = "ERR_IAM_UNKNOWN_ROLE";
pub const ERR_UNKNOWN_ACTION: &str = "ERR_IAM_UNKNOWN_ACTION";

/// Role-based access check for the action the request implies.
///
/// Evaluation order:
/// 1. Role from `context.role`, else the policy default role
/// 2. Action from `context.action_type`, else inferred from routing hints,
///    else READ; an unparseable explicit action is denied
/// 3. Role in `default_roles` grants; role in `restricted` denies;
///    any other role is denied as unknown
pub struct PermissionProvider {
    reference: Arc<ReferenceData>,
}

impl PermissionProvider {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }

    pub fn check(&self, ctx: &GateContext) -> PermissionEvidence {
        let policies = &self.reference.permissions;
        let role = ctx.role().unwrap_or(&policies.default_role).to_string();

        let action = match ctx.action_type() {
            Some(Ok(action)) => action,
            Some(Err(_)) => {
                return PermissionEvidence {
                    has_access: false,
                    user_role: role,
                    action_type: ctx.str_field("action_type").unwrap_or_default().to_string(),
                    reason_code: ERR_UNKNOWN_ACTION.into(),
                }
            }
            None => self.infer_action(ctx),
        };

        let rules = policies.action_permissions.get(&action);
        let (has_access, reason) = match rules {
            Some(p) if p.default_roles.iter().any(|r| *r == role) => (true, PERMISSION_OK),
            Some(p) if p.restricted.iter().any(|r| *r == role) => (false, ERR_ACTION_RESTRICTED),
            _ => (false, ERR_UNKNOWN_ROLE),
        };
        PermissionEvidence {
            has_access,
            user_role: role,
            action_type: action.as_str().to_string(),
            reason_code: reason.into(),
        }
    }

    fn infer_action(&self, ctx: &GateContext) -> ActionType {
        self.reference
            .tools
            .infer_tool(&ctx.text_lower())
            .map(|t| t.action_type)
            .unwrap_or(ActionType::Read)
    }
}

#[async_trait]
impl EvidenceProvider for PermissionProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Permission
    }

    async fn collect(&self, ctx: &GateContext) -> Result<EvidencePayload, ProviderError> {
        Ok(EvidencePayload::Permission(self.check(ctx)))
    }
}
