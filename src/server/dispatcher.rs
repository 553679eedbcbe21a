//! LDAP request dispatcher.
//!
//! One dispatcher instance serves the whole process; it multiplexes
//! decoded LDAP messages onto the directory and the session registry.
//! Only Bind (simple), Search and Unbind are honored; every mutation
//! operation is answered with `unwillingToPerform`.

use std::sync::Arc;

use ldap3_proto::proto::{
    LdapBindCred, LdapBindRequest, LdapBindResponse, LdapExtendedResponse, LdapMsg, LdapOp,
    LdapPartialAttribute, LdapResult, LdapResultCode, LdapSearchRequest, LdapSearchResultEntry,
    LdapSearchScope,
};
use tracing::{debug, info, instrument, warn};

use crate::directory::{Directory, Entry, SearchScope};
use crate::server::sessions::SessionRegistry;

const UNSUPPORTED_OPERATION: &str = "cerberus-ldap only supports Bind and Search operations";

/// What the connection loop should do after handling one message.
#[derive(Debug)]
pub enum Disposition {
    /// Send these messages and keep the connection open.
    Reply(Vec<LdapMsg>),
    /// Close the connection (Unbind, or protocol nonsense).
    Close,
}

/// Routes decoded LDAP requests to the directory and session registry.
#[derive(Clone)]
pub struct Dispatcher {
    directory: Arc<Directory>,
    sessions: Arc<SessionRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given directory and registry.
    pub fn new(directory: Arc<Directory>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            directory,
            sessions,
        }
    }

    /// Handles a single decoded message for the given connection.
    #[instrument(skip(self, msg), fields(msgid = msg.msgid))]
    pub fn handle(&self, conn_id: u64, msg: LdapMsg) -> Disposition {
        match msg.op {
            LdapOp::BindRequest(request) => {
                Disposition::Reply(vec![self.bind(conn_id, msg.msgid, request)])
            }
            LdapOp::UnbindRequest => {
                debug!("unbind, closing connection");
                self.sessions.delete(conn_id);
                Disposition::Close
            }
            LdapOp::SearchRequest(request) => {
                Disposition::Reply(self.search(conn_id, msg.msgid, request))
            }
            LdapOp::AddRequest(_) => Disposition::Reply(vec![unwilling(
                msg.msgid,
                LdapOp::AddResponse(result(
                    LdapResultCode::UnwillingToPerform,
                    UNSUPPORTED_OPERATION,
                )),
            )]),
            LdapOp::ModifyRequest(_) => Disposition::Reply(vec![unwilling(
                msg.msgid,
                LdapOp::ModifyResponse(result(
                    LdapResultCode::UnwillingToPerform,
                    UNSUPPORTED_OPERATION,
                )),
            )]),
            LdapOp::DelRequest(_) => Disposition::Reply(vec![unwilling(
                msg.msgid,
                LdapOp::DelResponse(result(
                    LdapResultCode::UnwillingToPerform,
                    UNSUPPORTED_OPERATION,
                )),
            )]),
            LdapOp::AbandonRequest(_) => Disposition::Reply(Vec::new()),
            LdapOp::ExtendedRequest(_) => Disposition::Reply(vec![unwilling(
                msg.msgid,
                LdapOp::ExtendedResponse(LdapExtendedResponse {
                    res: result(LdapResultCode::UnwillingToPerform, UNSUPPORTED_OPERATION),
                    name: None,
                    value: None,
                }),
            )]),
            op => {
                warn!(?op, "unexpected operation, closing connection");
                Disposition::Close
            }
        }
    }

    /// Simple bind: authenticate the entry named by the DN and register a
    /// session. Every authentication failure collapses to
    /// `invalidCredentials` so callers cannot enumerate entries.
    fn bind(&self, conn_id: u64, msgid: i32, request: LdapBindRequest) -> LdapMsg {
        #[allow(unreachable_patterns)]
        let password = match request.cred {
            LdapBindCred::Simple(password) => password,
            _ => {
                info!(dn = %request.dn, "bind rejected: unsupported authentication method");
                return bind_response(msgid, LdapResultCode::InvalidCredentials, "");
            }
        };

        let Some(entry) = self.directory.lookup(&request.dn) else {
            info!(dn = %request.dn, "authentication failure: unknown entry");
            return bind_response(msgid, LdapResultCode::InvalidCredentials, "");
        };

        if !entry.bind(&password) {
            info!(dn = %request.dn, "authentication failure: invalid credentials");
            return bind_response(msgid, LdapResultCode::InvalidCredentials, "");
        }

        match self.sessions.new_session(conn_id, entry, false) {
            Ok(()) => {
                info!(dn = %request.dn, "bind successful");
                bind_response(msgid, LdapResultCode::Success, "")
            }
            // code 80 on the wire, the codec names it Other
            Err(err) => bind_response(msgid, LdapResultCode::Other, &err.to_string()),
        }
    }

    /// Search: requires an authenticated session, evaluates the filter
    /// over the requested scope and emits every match the bound entry is
    /// allowed to read.
    fn search(&self, conn_id: u64, msgid: i32, request: LdapSearchRequest) -> Vec<LdapMsg> {
        let Some(bound) = self.sessions.session(conn_id) else {
            debug!(base = %request.base, "search rejected: no authenticated session");
            return vec![search_done(
                msgid,
                LdapResultCode::InsufficentAccessRights,
                "",
            )];
        };

        let Some(base) = self.directory.lookup(&request.base) else {
            debug!(base = %request.base, "search failed: base entry not found");
            return vec![search_done(msgid, LdapResultCode::NoSuchObject, "")];
        };

        let scope = match request.scope {
            LdapSearchScope::Base => SearchScope::Base,
            LdapSearchScope::OneLevel => SearchScope::OneLevel,
            _ => SearchScope::Subtree,
        };

        let matches = match base.search(scope, &request.filter) {
            Ok(matches) => matches,
            Err(err) => {
                debug!(base = %request.base, error = %err, "search failed");
                return vec![search_done(
                    msgid,
                    LdapResultCode::OperationsError,
                    &err.to_string(),
                )];
            }
        };

        let mut responses: Vec<LdapMsg> = matches
            .iter()
            .filter(|entry| bound.can_read(entry.dn()))
            .map(|entry| LdapMsg {
                msgid,
                op: LdapOp::SearchResultEntry(project(entry, &request.attrs)),
                ctrl: Vec::new(),
            })
            .collect();

        debug!(
            base = %request.base,
            matched = matches.len(),
            emitted = responses.len(),
            "search completed"
        );
        responses.push(search_done(msgid, LdapResultCode::Success, ""));
        responses
    }
}

/// Builds the wire form of an entry, keeping only the requested
/// attributes. An empty projection (or `*`) keeps everything.
fn project(entry: &Entry, attrs: &[String]) -> LdapSearchResultEntry {
    let all = attrs.is_empty() || attrs.iter().any(|attr| attr == "*");

    let attributes = entry
        .attributes()
        .iter()
        .filter(|(name, _)| {
            all || attrs
                .iter()
                .any(|requested| requested.eq_ignore_ascii_case(name))
        })
        .map(|(name, values)| LdapPartialAttribute {
            atype: name.clone(),
            vals: values.iter().map(|value| value.as_bytes().to_vec()).collect(),
        })
        .collect();

    LdapSearchResultEntry {
        dn: entry.dn().to_string(),
        attributes,
    }
}

fn result(code: LdapResultCode, message: &str) -> LdapResult {
    LdapResult {
        code,
        matcheddn: String::new(),
        message: message.to_string(),
        referral: Vec::new(),
    }
}

fn bind_response(msgid: i32, code: LdapResultCode, message: &str) -> LdapMsg {
    LdapMsg {
        msgid,
        op: LdapOp::BindResponse(LdapBindResponse {
            res: result(code, message),
            saslcreds: None,
        }),
        ctrl: Vec::new(),
    }
}

fn search_done(msgid: i32, code: LdapResultCode, message: &str) -> LdapMsg {
    LdapMsg {
        msgid,
        op: LdapOp::SearchResultDone(result(code, message)),
        ctrl: Vec::new(),
    }
}

fn unwilling(msgid: i32, op: LdapOp) -> LdapMsg {
    LdapMsg {
        msgid,
        op,
        ctrl: Vec::new(),
    }
}
