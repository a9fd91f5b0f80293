use custom_error::custom_error;
use reqwest::Error;
use url::ParseError;

custom_error! {
///! A single failed delivery attempt against the mail provider.
pub EmailClientError
    InvalidUri{source:ParseError} = "{source}",
    InvalidRequest{source:Error} = "{source}",
    ErrorResponse{code:String, reason:String} = "mail provider rejected the message \
    with status {code}: {reason}",
}
