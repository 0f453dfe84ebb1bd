//! Theme toggler: one provider, a few consumers, a button that flips the theme.
//!
//! Run with: RUST_LOG=debug cargo run --example theme

use spark_context::{create_context, root_scope, same_value_by_eq, Consumer, Context};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Theme {
    Light,
    Dark,
}

same_value_by_eq!(Theme);

impl Theme {
    fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    fn color(self) -> &'static str {
        match self {
            Theme::Light => "#000",
            Theme::Dark => "#fff",
        }
    }

    fn emoji(self) -> &'static str {
        match self {
            Theme::Light => "⚡️",
            Theme::Dark => "🕶",
        }
    }
}

fn title(ctx: &Context<Theme>, text: &'static str) -> Consumer<Theme> {
    ctx.consumer()
        .on_change(move |theme: &Theme| println!("<h1 color={}>{text}</h1>", theme.color()))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let theme_context = create_context(Theme::Light);
    let app = root_scope();

    // Rendered outside the toggler: always the default theme
    let orphan = title(&theme_context, "No provider here");
    orphan.mount_scoped(&app.child()).expect("mount orphan title");

    let toggler = app.child();
    let provider = theme_context.provider();
    provider
        .mount_scoped(&toggler, Theme::Light)
        .expect("mount theme provider");

    let heading = title(&theme_context, "Really cool context");
    heading.mount_scoped(&toggler.child()).expect("mount title");

    let emoji = theme_context
        .consumer()
        .on_change(|theme: &Theme| println!("<div>{}</div>", theme.emoji()));
    emoji.mount_scoped(&toggler.child()).expect("mount emoji");

    for click in 1..=3 {
        let next = heading.value().toggled();
        println!("-- click {click}: toggle to {next:?}");
        provider.update(next).expect("provider is mounted");
    }

    println!(
        "orphan still sees {:?}, heading sees {:?}",
        orphan.value(),
        heading.value()
    );

    app.stop();
}
