/// The public base url of this service, used to build the per-recipient
/// unsubscribe links embedded in outgoing emails.
#[derive(Clone, Debug)]
pub struct AppBaseUrl(pub String);
