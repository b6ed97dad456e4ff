use crate::db::{AppealsDb, BansDb, RecoveryCodesDb, UsersDb};
use crate::error::SafetyError;
use crate::models::{
    AppealStatus, BanAppeal, CreateBanInput, ImpersonationEndReason, ImpersonationSession,
    RecordLoginInput, SubmitAppealInput, UserBan, UserDevice,
};
use crate::services::{
    AppealService, BanService, DeviceService, ImpersonationService, StatusSynchronizer,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use uuid::Uuid;

// Include generated proto code
pub mod account_safety {
    tonic::include_proto!("fieldstone.account_safety.v1");
}

use account_safety::account_safety_service_server::AccountSafetyService;
use account_safety::*;

/// gRPC service implementation
pub struct AccountSafetyServiceImpl {
    ban_service: Arc<BanService>,
    appeal_service: Arc<AppealService>,
    device_service: Arc<DeviceService>,
    impersonation_service: Arc<ImpersonationService>,
    status_sync: Arc<StatusSynchronizer>,
    bans_db: Arc<BansDb>,
    appeals_db: Arc<AppealsDb>,
    users_db: Arc<UsersDb>,
    recovery_codes: Arc<RecoveryCodesDb>,
}

impl AccountSafetyServiceImpl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ban_service: Arc<BanService>,
        appeal_service: Arc<AppealService>,
        device_service: Arc<DeviceService>,
        impersonation_service: Arc<ImpersonationService>,
        status_sync: Arc<StatusSynchronizer>,
        bans_db: Arc<BansDb>,
        appeals_db: Arc<AppealsDb>,
        users_db: Arc<UsersDb>,
        recovery_codes: Arc<RecoveryCodesDb>,
    ) -> Self {
        Self {
            ban_service,
            appeal_service,
            device_service,
            impersonation_service,
            status_sync,
            bans_db,
            appeals_db,
            users_db,
            recovery_codes,
        }
    }
}

/// Clamp caller-supplied pagination to sane bounds
fn page_bounds(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 { 50 } else { limit.min(200) };
    (limit, offset.max(0))
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(value)
        .map_err(|_| Status::invalid_argument(format!("{} must be a valid UUID", field)))
}

fn parse_opt_uuid(value: &str, field: &str) -> Result<Option<Uuid>, Status> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_uuid(value, field).map(Some)
    }
}

fn parse_opt_timestamp(value: &str, field: &str) -> Result<Option<DateTime<Utc>>, Status> {
    if value.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| Some(ts.with_timezone(&Utc)))
        .map_err(|_| Status::invalid_argument(format!("{} must be an RFC 3339 timestamp", field)))
}

fn opt_string(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn fmt_opt_ts(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339()).unwrap_or_default()
}

fn fmt_opt_uuid(id: Option<Uuid>) -> String {
    id.map(|u| u.to_string()).unwrap_or_default()
}

fn ban_to_proto(ban: &UserBan) -> Ban {
    Ban {
        id: ban.id.to_string(),
        user_id: fmt_opt_uuid(ban.user_id),
        ip_address: ban.ip_address.clone().unwrap_or_default(),
        ip_ban: ban.ip_ban,
        reason: ban.reason.clone(),
        admin_notes: ban.admin_notes.clone().unwrap_or_default(),
        banned_by: fmt_opt_uuid(ban.banned_by),
        banned_at: fmt_ts(ban.banned_at),
        expires_at: fmt_opt_ts(ban.expires_at),
        is_active: ban.is_active,
        is_irrevocable: ban.is_irrevocable,
    }
}

fn appeal_to_proto(appeal: &BanAppeal) -> Appeal {
    Appeal {
        id: appeal.id.to_string(),
        ban_id: appeal.user_ban_id.to_string(),
        user_id: appeal.user_id.to_string(),
        reason: appeal.reason.clone(),
        evidence_path: appeal.evidence_path.clone().unwrap_or_default(),
        status: appeal.status.as_str().to_string(),
        admin_response: appeal.admin_response.clone().unwrap_or_default(),
        reviewed_by: fmt_opt_uuid(appeal.reviewed_by),
        reviewed_at: fmt_opt_ts(appeal.reviewed_at),
        terms_accepted: appeal.terms_accepted,
        created_at: fmt_ts(appeal.created_at),
    }
}

fn device_to_proto(device: &UserDevice) -> Device {
    Device {
        id: device.id.to_string(),
        user_id: device.user_id.to_string(),
        device_id: device.device_id.clone(),
        device_name: device.device_name.clone().unwrap_or_default(),
        browser_name: device.browser_name.clone().unwrap_or_default(),
        os_name: device.os_name.clone().unwrap_or_default(),
        ip_address: device.ip_address.clone().unwrap_or_default(),
        is_trusted: device.is_trusted,
        last_used_at: fmt_ts(device.last_used_at),
        verified_at: fmt_opt_ts(device.verified_at),
        created_at: fmt_ts(device.created_at),
    }
}

fn impersonation_to_proto(session: &ImpersonationSession) -> account_safety::ImpersonationSession {
    account_safety::ImpersonationSession {
        id: session.id.to_string(),
        impersonator_id: session.impersonator_id.to_string(),
        target_user_id: session.target_user_id.to_string(),
        started_at: fmt_ts(session.started_at),
        ended_at: fmt_opt_ts(session.ended_at),
        end_reason: session
            .end_reason
            .map(|r| r.as_str().to_string())
            .unwrap_or_default(),
    }
}

#[tonic::async_trait]
impl AccountSafetyService for AccountSafetyServiceImpl {
    async fn create_ban(
        &self,
        request: Request<CreateBanRequest>,
    ) -> Result<Response<BanResponse>, Status> {
        let req = request.into_inner();

        if req.actor_id.is_empty() {
            return Err(Status::invalid_argument(
                "actor_id is mandatory for ban creation",
            ));
        }

        let input = CreateBanInput {
            user_id: parse_opt_uuid(&req.user_id, "user_id")?,
            ip_address: opt_string(req.ip_address),
            ip_ban: req.ip_ban,
            reason: req.reason,
            admin_notes: opt_string(req.admin_notes),
            expires_at: parse_opt_timestamp(&req.expires_at, "expires_at")?,
            is_irrevocable: req.is_irrevocable,
            actor_id: parse_uuid(&req.actor_id, "actor_id")?,
        };

        let ban = self.ban_service.create_ban(input).await?;

        Ok(Response::new(BanResponse {
            ban: Some(ban_to_proto(&ban)),
        }))
    }

    async fn revoke_ban(
        &self,
        request: Request<RevokeBanRequest>,
    ) -> Result<Response<BanResponse>, Status> {
        let req = request.into_inner();

        if req.actor_id.is_empty() {
            return Err(Status::invalid_argument(
                "actor_id is mandatory for ban revocation",
            ));
        }

        let ban_id = parse_uuid(&req.ban_id, "ban_id")?;
        let actor_id = parse_uuid(&req.actor_id, "actor_id")?;

        let ban = self.ban_service.revoke_ban(ban_id, actor_id).await?;

        Ok(Response::new(BanResponse {
            ban: Some(ban_to_proto(&ban)),
        }))
    }

    async fn get_ban(
        &self,
        request: Request<GetBanRequest>,
    ) -> Result<Response<BanResponse>, Status> {
        let req = request.into_inner();
        let ban_id = parse_uuid(&req.ban_id, "ban_id")?;

        let ban = self.bans_db.get_ban(ban_id).await?;

        Ok(Response::new(BanResponse {
            ban: Some(ban_to_proto(&ban)),
        }))
    }

    async fn list_bans(
        &self,
        request: Request<ListBansRequest>,
    ) -> Result<Response<ListBansResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_uuid(&req.user_id, "user_id")?;
        let (limit, offset) = page_bounds(req.limit, req.offset);

        let bans = self.bans_db.list_user_bans(user_id, limit, offset).await?;

        Ok(Response::new(ListBansResponse {
            bans: bans.iter().map(ban_to_proto).collect(),
        }))
    }

    async fn check_ban_status(
        &self,
        request: Request<CheckBanStatusRequest>,
    ) -> Result<Response<CheckBanStatusResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_uuid(&req.user_id, "user_id")?;

        let active_ban = self.bans_db.get_active_ban(user_id).await?;

        Ok(Response::new(CheckBanStatusResponse {
            is_banned: active_ban.is_some(),
            active_ban: active_ban.as_ref().map(ban_to_proto),
        }))
    }

    async fn check_ip_ban(
        &self,
        request: Request<CheckIpBanRequest>,
    ) -> Result<Response<CheckIpBanResponse>, Status> {
        let req = request.into_inner();

        if req.ip_address.is_empty() {
            return Err(Status::invalid_argument("ip_address must not be empty"));
        }

        let is_banned = self.bans_db.is_ip_banned(&req.ip_address).await?;

        Ok(Response::new(CheckIpBanResponse { is_banned }))
    }

    async fn issue_appeal_url(
        &self,
        request: Request<IssueAppealUrlRequest>,
    ) -> Result<Response<IssueAppealUrlResponse>, Status> {
        let req = request.into_inner();
        let ban_id = parse_uuid(&req.ban_id, "ban_id")?;

        let (token, expires_at) = self.ban_service.issue_appeal_url_token(ban_id).await?;

        Ok(Response::new(IssueAppealUrlResponse {
            token,
            expires_at: fmt_ts(expires_at),
        }))
    }

    async fn validate_appeal_url(
        &self,
        request: Request<ValidateAppealUrlRequest>,
    ) -> Result<Response<BanResponse>, Status> {
        let req = request.into_inner();

        if req.token.is_empty() {
            return Err(SafetyError::NotFound("Invalid or expired token".into()).into());
        }

        let ban = self.ban_service.validate_appeal_url_token(&req.token).await?;

        Ok(Response::new(BanResponse {
            ban: Some(ban_to_proto(&ban)),
        }))
    }

    async fn submit_appeal(
        &self,
        request: Request<SubmitAppealRequest>,
    ) -> Result<Response<SubmitAppealResponse>, Status> {
        let req = request.into_inner();

        let input = SubmitAppealInput {
            ban_id: parse_uuid(&req.ban_id, "ban_id")?,
            user_id: parse_uuid(&req.user_id, "user_id")?,
            reason: req.reason,
            evidence_path: opt_string(req.evidence_path),
            terms_accepted: req.terms_accepted,
            request_ip: opt_string(req.request_ip),
            request_user_agent: opt_string(req.request_user_agent),
        };

        let (appeal, token) = self.appeal_service.submit_appeal(input).await?;

        Ok(Response::new(SubmitAppealResponse {
            appeal: Some(appeal_to_proto(&appeal)),
            token,
        }))
    }

    async fn review_appeal(
        &self,
        request: Request<ReviewAppealRequest>,
    ) -> Result<Response<AppealResponse>, Status> {
        let req = request.into_inner();

        if req.reviewer_id.is_empty() {
            return Err(Status::invalid_argument(
                "reviewer_id is mandatory for appeal review",
            ));
        }

        let appeal_id = parse_uuid(&req.appeal_id, "appeal_id")?;
        let reviewer_id = parse_uuid(&req.reviewer_id, "reviewer_id")?;

        let decision = AppealStatus::parse(&req.decision)
            .filter(|d| *d != AppealStatus::Pending)
            .ok_or_else(|| {
                Status::invalid_argument(
                    "decision must be one of: approved, rejected, more_info_requested",
                )
            })?;

        let appeal = self
            .appeal_service
            .review_appeal(
                appeal_id,
                reviewer_id,
                decision,
                opt_string(req.admin_response).as_deref(),
            )
            .await?;

        Ok(Response::new(AppealResponse {
            appeal: Some(appeal_to_proto(&appeal)),
        }))
    }

    async fn get_appeal(
        &self,
        request: Request<GetAppealRequest>,
    ) -> Result<Response<AppealResponse>, Status> {
        let req = request.into_inner();
        let appeal_id = parse_uuid(&req.appeal_id, "appeal_id")?;

        let appeal = self.appeals_db.get_appeal(appeal_id).await?;

        Ok(Response::new(AppealResponse {
            appeal: Some(appeal_to_proto(&appeal)),
        }))
    }

    async fn list_appeals(
        &self,
        request: Request<ListAppealsRequest>,
    ) -> Result<Response<ListAppealsResponse>, Status> {
        let req = request.into_inner();
        let (limit, offset) = page_bounds(req.limit, req.offset);

        let status = if req.status.is_empty() {
            None
        } else {
            Some(AppealStatus::parse(&req.status).ok_or_else(|| {
                Status::invalid_argument(
                    "status must be one of: pending, approved, rejected, more_info_requested",
                )
            })?)
        };

        let appeals = self.appeals_db.list_appeals(status, limit, offset).await?;

        Ok(Response::new(ListAppealsResponse {
            appeals: appeals.iter().map(appeal_to_proto).collect(),
        }))
    }

    async fn validate_appeal_token(
        &self,
        request: Request<ValidateAppealTokenRequest>,
    ) -> Result<Response<AppealResponse>, Status> {
        let req = request.into_inner();

        if req.token.is_empty() {
            return Err(SafetyError::NotFound("Invalid or expired token".into()).into());
        }

        let appeal = self.appeal_service.validate_appeal_token(&req.token).await?;

        Ok(Response::new(AppealResponse {
            appeal: Some(appeal_to_proto(&appeal)),
        }))
    }

    async fn rotate_appeal_token(
        &self,
        request: Request<RotateAppealTokenRequest>,
    ) -> Result<Response<RotateAppealTokenResponse>, Status> {
        let req = request.into_inner();
        let appeal_id = parse_uuid(&req.appeal_id, "appeal_id")?;

        let (appeal, token) = self.appeal_service.rotate_appeal_token(appeal_id).await?;

        Ok(Response::new(RotateAppealTokenResponse {
            appeal: Some(appeal_to_proto(&appeal)),
            token,
        }))
    }

    async fn record_login(
        &self,
        request: Request<RecordLoginRequest>,
    ) -> Result<Response<DeviceResponse>, Status> {
        let req = request.into_inner();

        if req.device_id.is_empty() {
            return Err(Status::invalid_argument("device_id must not be empty"));
        }

        let input = RecordLoginInput {
            user_id: parse_uuid(&req.user_id, "user_id")?,
            device_id: req.device_id,
            device_name: opt_string(req.device_name),
            browser_name: opt_string(req.browser_name),
            browser_version: opt_string(req.browser_version),
            os_name: opt_string(req.os_name),
            os_version: opt_string(req.os_version),
            ip_address: opt_string(req.ip_address),
            location_country: opt_string(req.location_country),
            location_city: opt_string(req.location_city),
        };

        let device = self.device_service.record_login(input).await?;

        Ok(Response::new(DeviceResponse {
            device: Some(device_to_proto(&device)),
        }))
    }

    async fn mark_device_trusted(
        &self,
        request: Request<MarkDeviceTrustedRequest>,
    ) -> Result<Response<MarkDeviceTrustedResponse>, Status> {
        let req = request.into_inner();
        let device_record_id = parse_uuid(&req.device_record_id, "device_record_id")?;

        let (device, trusted, token) = self.device_service.mark_trusted(device_record_id).await?;

        Ok(Response::new(MarkDeviceTrustedResponse {
            device: Some(device_to_proto(&device)),
            token,
            expires_at: fmt_ts(trusted.expires_at),
        }))
    }

    async fn check_device_trust(
        &self,
        request: Request<CheckDeviceTrustRequest>,
    ) -> Result<Response<CheckDeviceTrustResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_uuid(&req.user_id, "user_id")?;

        if req.device_id.is_empty() || req.token.is_empty() {
            return Ok(Response::new(CheckDeviceTrustResponse { is_trusted: false }));
        }

        let is_trusted = self
            .device_service
            .is_device_trusted(user_id, &req.device_id, &req.token)
            .await?;

        Ok(Response::new(CheckDeviceTrustResponse { is_trusted }))
    }

    async fn list_devices(
        &self,
        request: Request<ListDevicesRequest>,
    ) -> Result<Response<ListDevicesResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_uuid(&req.user_id, "user_id")?;

        let devices = self.device_service.list_devices(user_id).await?;

        Ok(Response::new(ListDevicesResponse {
            devices: devices.iter().map(device_to_proto).collect(),
        }))
    }

    async fn enforce_session_limit(
        &self,
        request: Request<EnforceSessionLimitRequest>,
    ) -> Result<Response<EnforceSessionLimitResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_uuid(&req.user_id, "user_id")?;

        let evicted = self
            .device_service
            .enforce_session_limit(user_id, &req.role)
            .await?;

        Ok(Response::new(EnforceSessionLimitResponse {
            evicted_device_record_ids: evicted.iter().map(Uuid::to_string).collect(),
        }))
    }

    async fn revoke_device(
        &self,
        request: Request<RevokeDeviceRequest>,
    ) -> Result<Response<RevokeDeviceResponse>, Status> {
        let req = request.into_inner();
        let device_record_id = parse_uuid(&req.device_record_id, "device_record_id")?;

        let revoked_count = self.device_service.revoke_device(device_record_id).await?;

        Ok(Response::new(RevokeDeviceResponse { revoked_count }))
    }

    async fn revoke_all_devices(
        &self,
        request: Request<RevokeAllDevicesRequest>,
    ) -> Result<Response<RevokeDeviceResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_uuid(&req.user_id, "user_id")?;
        let current =
            parse_opt_uuid(&req.current_device_record_id, "current_device_record_id")?;

        let revoked_count = self
            .device_service
            .revoke_all_except_current(user_id, current)
            .await?;

        Ok(Response::new(RevokeDeviceResponse { revoked_count }))
    }

    async fn run_status_sync(
        &self,
        _request: Request<RunStatusSyncRequest>,
    ) -> Result<Response<RunStatusSyncResponse>, Status> {
        let report = self.status_sync.reconcile().await?;

        Ok(Response::new(RunStatusSyncResponse {
            marked_banned: report.marked_banned,
            reactivated: report.reactivated,
        }))
    }

    async fn get_user_status(
        &self,
        request: Request<GetUserStatusRequest>,
    ) -> Result<Response<GetUserStatusResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_uuid(&req.user_id, "user_id")?;

        let status = self.users_db.get_status(user_id).await?;

        Ok(Response::new(GetUserStatusResponse {
            status: status.as_str().to_string(),
        }))
    }

    async fn start_impersonation(
        &self,
        request: Request<StartImpersonationRequest>,
    ) -> Result<Response<StartImpersonationResponse>, Status> {
        let req = request.into_inner();
        let admin_id = parse_uuid(&req.admin_id, "admin_id")?;
        let target_user_id = parse_uuid(&req.target_user_id, "target_user_id")?;

        let (session, token) = self.impersonation_service.start(admin_id, target_user_id).await?;

        Ok(Response::new(StartImpersonationResponse {
            session: Some(impersonation_to_proto(&session)),
            token,
        }))
    }

    async fn end_impersonation(
        &self,
        request: Request<EndImpersonationRequest>,
    ) -> Result<Response<ImpersonationResponse>, Status> {
        let req = request.into_inner();

        let end_reason = ImpersonationEndReason::parse(&req.end_reason).ok_or_else(|| {
            Status::invalid_argument("end_reason must be one of: logout, expired, manual_stop")
        })?;

        let session = self.impersonation_service.end(&req.token, end_reason).await?;

        Ok(Response::new(ImpersonationResponse {
            session: Some(impersonation_to_proto(&session)),
        }))
    }

    async fn list_impersonation_sessions(
        &self,
        request: Request<ListImpersonationSessionsRequest>,
    ) -> Result<Response<ListImpersonationSessionsResponse>, Status> {
        let req = request.into_inner();
        let impersonator_id = parse_uuid(&req.impersonator_id, "impersonator_id")?;
        let (limit, offset) = page_bounds(req.limit, req.offset);

        let sessions = self
            .impersonation_service
            .list_for_impersonator(impersonator_id, limit, offset)
            .await?;

        Ok(Response::new(ListImpersonationSessionsResponse {
            sessions: sessions.iter().map(impersonation_to_proto).collect(),
        }))
    }

    async fn record_recovery_code_use(
        &self,
        request: Request<RecordRecoveryCodeUseRequest>,
    ) -> Result<Response<RecordRecoveryCodeUseResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_uuid(&req.user_id, "user_id")?;

        if req.code_hash.is_empty() {
            return Err(Status::invalid_argument("code_hash must not be empty"));
        }

        let usage = self
            .recovery_codes
            .record_usage(
                user_id,
                &req.code_hash,
                opt_string(req.ip_address).as_deref(),
                opt_string(req.user_agent).as_deref(),
            )
            .await?;

        Ok(Response::new(RecordRecoveryCodeUseResponse {
            usage_id: usage.id.to_string(),
        }))
    }

    async fn list_recovery_code_uses(
        &self,
        request: Request<ListRecoveryCodeUsesRequest>,
    ) -> Result<Response<ListRecoveryCodeUsesResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_uuid(&req.user_id, "user_id")?;
        let (limit, offset) = page_bounds(req.limit, req.offset);

        let usages = self.recovery_codes.list_usages(user_id, limit, offset).await?;

        Ok(Response::new(ListRecoveryCodeUsesResponse {
            usages: usages
                .iter()
                .map(|u| account_safety::RecoveryCodeUsage {
                    id: u.id.to_string(),
                    user_id: u.user_id.to_string(),
                    ip_address: u.ip_address.clone().unwrap_or_default(),
                    user_agent: u.user_agent.clone().unwrap_or_default(),
                    used_at: fmt_ts(u.used_at),
                })
                .collect(),
        }))
    }
}
