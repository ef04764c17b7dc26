//! Default player_api.php response: the backend account as seen through the proxy.

use crate::config::ProxyConfig;
use crate::services::xtream::{FlexValue, XtreamAuthResponse, XtreamServerInfo, XtreamUserInfo};

/// Build the login payload returned for absent or unrecognized actions
///
/// Account status fields and server time fields come from the backend session;
/// identity, host, port and protocol are replaced with the proxy-facing values
/// so clients never learn the backend address or credentials.
pub fn build_login_response(
    config: &ProxyConfig,
    account: &XtreamAuthResponse,
) -> XtreamAuthResponse {
    let protocol = config.protocol();
    let port = FlexValue::Int(i64::from(config.advertised_port));
    let backend_user = &account.user_info;
    let backend_server = &account.server_info;

    XtreamAuthResponse {
        user_info: XtreamUserInfo {
            username: config.user.clone(),
            password: config.password.clone(),
            ..backend_user.clone()
        },
        server_info: XtreamServerInfo {
            url: format!("{}://{}", protocol, config.hostname),
            port: port.clone(),
            https_port: port.clone(),
            server_protocol: protocol.to_string(),
            rtmp_port: port,
            timezone: backend_server.timezone.clone(),
            timestamp_now: backend_server.timestamp_now.clone(),
            time_now: backend_server.time_now.clone(),
        },
    }
}
