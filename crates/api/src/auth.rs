use std::sync::Arc;

use fleet_auth::{RequestHeaders, VerifiedRequest, Verifier};
use fleet_domain::repositories::IdentityRepository;
use fleet_errors::{FleetError, FleetResult};
use metrics::counter;
use tracing::{debug, warn};

/// 通过签名校验且已绑定目标的 Agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAgent {
    pub service: String,
    pub identity: String,
    pub target_id: i64,
}

/// 签名校验加身份登记查询
pub struct RequestAuthenticator {
    verifier: Verifier,
    identities: Arc<dyn IdentityRepository>,
}

impl RequestAuthenticator {
    pub fn new(verifier: Verifier, identities: Arc<dyn IdentityRepository>) -> Self {
        Self {
            verifier,
            identities,
        }
    }

    pub async fn authenticate(&self, headers: &RequestHeaders) -> FleetResult<AuthenticatedAgent> {
        let result = self.verifier.verify(headers);
        self.resolve(result).await
    }

    pub async fn authenticate_at(
        &self,
        headers: &RequestHeaders,
        now: i64,
    ) -> FleetResult<AuthenticatedAgent> {
        let result = self.verifier.verify_at(headers, now);
        self.resolve(result).await
    }

    async fn resolve(
        &self,
        verified: FleetResult<VerifiedRequest>,
    ) -> FleetResult<AuthenticatedAgent> {
        let outcome = match verified {
            Ok(request) => self.bind(request).await,
            Err(e) => Err(e),
        };

        if let Err(FleetError::Auth(reason)) = &outcome {
            counter!("fleet_auth_failures_total").increment(1);
            warn!("请求认证失败: {}", reason);
        }
        outcome
    }

    async fn bind(&self, request: VerifiedRequest) -> FleetResult<AuthenticatedAgent> {
        let identity = self
            .identities
            .find(&request.service, &request.identity)
            .await?
            .ok_or_else(|| {
                FleetError::auth(format!("公钥未登记到服务 {}", request.service))
            })?;

        let target_id = identity
            .target_id
            .ok_or_else(|| FleetError::auth("身份未绑定任何目标"))?;

        debug!("服务 {} 的请求已认证, 目标 {}", request.service, target_id);
        Ok(AuthenticatedAgent {
            service: request.service,
            identity: request.identity,
            target_id,
        })
    }
}
