use custom_error::custom_error;

custom_error! {
///! Rejected request input, detected before any mutation.
pub MalformedInput
    InvalidEmail{email:String} = "invalid email: {email}",
    InvalidName{name:String} = "invalid subscriber name: {name}",
    MissingTitle = "a post title is required",
    MissingPostUrl = "a post url is required",
    InvalidPostUrl{url:String} = "invalid post url: {url}",
    InvalidAttachment{message:String} = "invalid attachment: {message}",
}
