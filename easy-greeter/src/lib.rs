//! easy-greeter: the smallest easy service, no dependencies

use easy_common::{ContentType, HttpRequest, HttpWith, NoDeps};

/// `Hello!` or, with a `name` argument, `Hello, <name>!`
pub fn greeting(name: &str) -> String {
    if name.is_empty() {
        "Hello!\n".to_string()
    } else {
        format!("Hello, {}!\n", name)
    }
}

pub fn app<I, S>(args: I) -> HttpWith<NoDeps>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    HttpWith::<NoDeps>::new(args)
        .default_content_type(ContentType::TextPlain)
        .get("/hello", |req: HttpRequest| async move { greeting(req.get_arg("name")) })
}
