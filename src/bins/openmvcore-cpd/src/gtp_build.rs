//! GTPv2-C response construction

use std::net::Ipv4Addr;

use mvc_gtp::header::Gtp2MessageType;
use mvc_gtp::{
    BearerQos, CreateSessionResponse, DeleteSessionResponse, FTeid, Gtp2Cause, Gtp2Message,
    ModifyBearerResponse, F_TEID_S1_U_SGW_GTP_U,
};

use crate::smf_context::Session;

/// Accepted Create Session Response for `sess`
///
/// The core-assigned F-TEID points at the user plane address `up_addr`.
pub fn build_create_session_response(sess: &Session, up_addr: Ipv4Addr) -> Gtp2Message {
    Gtp2Message::CreateSessionResponse(CreateSessionResponse {
        cause: Gtp2Cause::RequestAccepted,
        sender_f_teid: Some(FTeid::new(F_TEID_S1_U_SGW_GTP_U, sess.local_teid, Some(up_addr))),
        paa: Some(sess.ue_addr),
        ebi: Some(sess.bearer_id),
        bearer_qos: Some(BearerQos::from(&sess.qos)),
    })
}

pub fn build_modify_bearer_response(sess: &Session) -> Gtp2Message {
    Gtp2Message::ModifyBearerResponse(ModifyBearerResponse {
        cause: Gtp2Cause::RequestAccepted,
        bearer_qos: Some(BearerQos::from(&sess.qos)),
    })
}

pub fn build_delete_session_response(cause: Gtp2Cause) -> Gtp2Message {
    Gtp2Message::DeleteSessionResponse(DeleteSessionResponse { cause })
}

/// Response carrying only `cause` for a request of `request_type`
///
/// Returns `None` for message types that are not requests.
pub fn build_rejection(request_type: Gtp2MessageType, cause: Gtp2Cause) -> Option<Gtp2Message> {
    match request_type {
        Gtp2MessageType::CreateSessionRequest => {
            Some(Gtp2Message::CreateSessionResponse(CreateSessionResponse::rejected(cause)))
        }
        Gtp2MessageType::ModifyBearerRequest => Some(Gtp2Message::ModifyBearerResponse(ModifyBearerResponse {
            cause,
            bearer_qos: None,
        })),
        Gtp2MessageType::DeleteSessionRequest => Some(build_delete_session_response(cause)),
        _ => None,
    }
}
