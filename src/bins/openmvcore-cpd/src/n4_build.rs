//! N4 message construction
//!
//! One uplink and one downlink PDR per session, each with its own FAR and a
//! shared QER carrying the bearer bit rates.

use std::net::Ipv4Addr;

use chrono::Utc;
use mvc_pfcp::prelude::*;

use crate::smf_context::Session;

pub const UL_PDR_ID: u16 = 1;
pub const DL_PDR_ID: u16 = 2;
pub const UL_FAR_ID: u32 = 1;
pub const DL_FAR_ID: u32 = 2;
pub const QER_ID: u32 = 1;

const PDR_PRECEDENCE: u32 = 255;
const NETWORK_INSTANCE: &str = "internet";

/// Seconds between the NTP epoch (1900) and the Unix epoch
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Current time as a PFCP Recovery Time Stamp
pub fn recovery_time_stamp() -> u32 {
    (Utc::now().timestamp() + NTP_UNIX_OFFSET) as u32
}

/// Session Establishment Request for `sess`
///
/// `cp_addr` is advertised in the CP F-SEID, `up_addr` is the user plane
/// address the peer tunnel should send uplink traffic to.
pub fn build_session_establishment_request(
    node_id: &NodeId,
    cp_addr: Ipv4Addr,
    up_addr: Ipv4Addr,
    sess: &Session,
) -> SessionEstablishmentRequest {
    let mut req = SessionEstablishmentRequest::new(node_id.clone(), FSeid::new_ipv4(sess.cp_seid, cp_addr));

    // Uplink: access -> core, decapsulate the peer's GTP-U
    let mut ul_pdi = Pdi::new(SourceInterface::Access);
    ul_pdi.local_f_teid = Some(FTeid::new_ipv4(sess.local_teid, up_addr));
    ul_pdi.network_instance = Some(NETWORK_INSTANCE.to_string());
    ul_pdi.ue_ip_address = Some(UeIpAddress::source(sess.ue_addr));
    let mut ul_pdr = CreatePdr::new(UL_PDR_ID, PDR_PRECEDENCE, ul_pdi);
    ul_pdr.outer_header_removal = Some(OuterHeaderRemoval::gtpu_udp_ipv4());
    ul_pdr.far_id = Some(UL_FAR_ID);
    ul_pdr.qer_id = Some(QER_ID);

    // Downlink: core -> access, matched on the UE address
    let mut dl_pdi = Pdi::new(SourceInterface::Core);
    dl_pdi.network_instance = Some(NETWORK_INSTANCE.to_string());
    dl_pdi.ue_ip_address = Some(UeIpAddress::destination(sess.ue_addr));
    let mut dl_pdr = CreatePdr::new(DL_PDR_ID, PDR_PRECEDENCE, dl_pdi);
    dl_pdr.far_id = Some(DL_FAR_ID);
    dl_pdr.qer_id = Some(QER_ID);

    req.create_pdrs = vec![ul_pdr, dl_pdr];

    let mut ul_far = CreateFar::new(UL_FAR_ID, ApplyAction::forward());
    let mut ul_fwd = ForwardingParameters::new(DestinationInterface::Core);
    ul_fwd.network_instance = Some(NETWORK_INSTANCE.to_string());
    ul_far.forwarding_parameters = Some(ul_fwd);

    let mut dl_far = CreateFar::new(DL_FAR_ID, ApplyAction::forward());
    let mut dl_fwd = ForwardingParameters::new(DestinationInterface::Access);
    dl_fwd.outer_header_creation = Some(OuterHeaderCreation::new_gtpu_ipv4(sess.peer_teid, sess.peer_addr));
    dl_far.forwarding_parameters = Some(dl_fwd);

    req.create_fars = vec![ul_far, dl_far];

    let mut qer = CreateQer::new(QER_ID, GateStatus::both_open());
    qer.maximum_bitrate = Some(maximum_bitrate(sess));
    qer.guaranteed_bitrate = guaranteed_bitrate(sess);
    req.create_qers = vec![qer];

    req
}

/// Session Modification Request pushing the bit rates of `sess.qos` to the
/// session QER
pub fn build_session_modification_request(sess: &Session) -> SessionModificationRequest {
    let mut qer = UpdateQer::new(QER_ID);
    qer.maximum_bitrate = Some(maximum_bitrate(sess));
    qer.guaranteed_bitrate = guaranteed_bitrate(sess);
    SessionModificationRequest {
        update_qers: vec![qer],
    }
}

fn maximum_bitrate(sess: &Session) -> Bitrate {
    Bitrate::new(sess.qos.mbr_ul, sess.qos.mbr_dl)
}

fn guaranteed_bitrate(sess: &Session) -> Option<Bitrate> {
    (sess.qos.gbr_ul > 0 || sess.qos.gbr_dl > 0).then(|| Bitrate::new(sess.qos.gbr_ul, sess.qos.gbr_dl))
}
