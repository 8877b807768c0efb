use app_explorer::driver::mock::{MockDriver, MockElement, MockScreen, TapEffect};
use app_explorer::explorer::explorer::{ExplorationReport, Explorer};
use app_explorer::explorer::nav_graph::{ExplorerConfig, Pacing};

pub const PACKAGE: &str = "com.example.shop";

/// Explorer settings with every pause removed.
pub fn config() -> ExplorerConfig {
    ExplorerConfig {
        pacing: Pacing::none(),
        ..ExplorerConfig::for_package(PACKAGE)
    }
}

pub fn run(driver: &mut MockDriver, config: ExplorerConfig) -> ExplorationReport {
    Explorer::new(driver, config).explore()
}

/// Product list with a cart icon and a back arrow.
pub fn shop_app() -> MockDriver {
    MockDriver::new(PACKAGE, "main")
        .screen(
            "main",
            MockScreen::new(".MainActivity")
                .with(MockElement::label("Products"))
                .with(MockElement::button("com.example.shop:id/cartIV"))
                .with(MockElement::button("com.example.shop:id/backIV")),
        )
        .screen(
            "cart",
            MockScreen::new(".CartActivity").with(MockElement::label("Cart")),
        )
        .on_tap("main", "cartIV", TapEffect::Navigate("cart".into()))
}

/// Four buttons that all open the same detail screen.
///
/// The fourth visit in a row trips stuck detection: from the signature
/// sequence alone this fan-in is indistinguishable from a looping modal.
pub fn repeating_app() -> MockDriver {
    let mut main = MockScreen::new(".MainActivity").with(MockElement::label("Home"));
    let mut driver = MockDriver::new(PACKAGE, "main");
    for i in 1..=4 {
        let id = format!("item{}", i);
        main = main.with(MockElement::button(&id));
        driver = driver.on_tap("main", &id, TapEffect::Navigate("detail".into()));
    }
    driver.screen("main", main).screen(
        "detail",
        MockScreen::new(".DetailActivity").with(MockElement::label("Detail")),
    )
}

/// A share button that hands the foreground to another app, then a cart.
pub fn sharing_app() -> MockDriver {
    MockDriver::new(PACKAGE, "main")
        .screen(
            "main",
            MockScreen::new(".MainActivity")
                .with(MockElement::label("Products"))
                .with(MockElement::button("shareBtn"))
                .with(MockElement::button("cartIV")),
        )
        .screen(
            "cart",
            MockScreen::new(".CartActivity").with(MockElement::label("Cart")),
        )
        .on_tap("main", "shareBtn", TapEffect::Leave("com.other.app".into()))
        .on_tap("main", "cartIV", TapEffect::Navigate("cart".into()))
}

/// Every button crashes the app.
pub fn crashing_app(buttons: usize) -> MockDriver {
    let mut main = MockScreen::new(".MainActivity").with(MockElement::label("Unstable"));
    let mut driver = MockDriver::new(PACKAGE, "main");
    for i in 1..=buttons {
        let id = format!("crash{}", i);
        main = main.with(MockElement::button(&id));
        driver = driver.on_tap("main", &id, TapEffect::Crash);
    }
    driver.screen("main", main)
}

/// A menu button revealing two sort options; only one of them navigates.
pub fn menu_app() -> MockDriver {
    MockDriver::new(PACKAGE, "main")
        .screen(
            "main",
            MockScreen::new(".MainActivity")
                .with(MockElement::label("Shop"))
                .with(MockElement::button("menuBtn")),
        )
        .screen(
            "sorted",
            MockScreen::new(".SortedActivity").with(MockElement::label("Sorted")),
        )
        .on_tap(
            "main",
            "menuBtn",
            TapEffect::Reveal(vec![
                MockElement::button("sortAsc"),
                MockElement::button("sortDesc"),
            ]),
        )
        .on_tap("main", "sortAsc", TapEffect::Navigate("sorted".into()))
}

/// Root reaches Y directly and through X: R -> X -> Y and R -> Y.
pub fn diamond_app() -> MockDriver {
    MockDriver::new(PACKAGE, "root")
        .screen(
            "root",
            MockScreen::new(".RootActivity")
                .with(MockElement::label("Root"))
                .with(MockElement::button("toX"))
                .with(MockElement::button("toY")),
        )
        .screen(
            "x",
            MockScreen::new(".XActivity")
                .with(MockElement::label("X"))
                .with(MockElement::button("toY")),
        )
        .screen(
            "y",
            MockScreen::new(".YActivity")
                .with(MockElement::label("Y"))
                .with(MockElement::button("likeBtn")),
        )
        .on_tap("root", "toX", TapEffect::Navigate("x".into()))
        .on_tap("root", "toY", TapEffect::Navigate("y".into()))
        .on_tap("x", "toY", TapEffect::Navigate("y".into()))
}

/// Login form leading to a home screen.
pub fn login_app() -> MockDriver {
    MockDriver::new(PACKAGE, "login")
        .screen(
            "login",
            MockScreen::new(".LoginActivity")
                .with(MockElement::label("Login"))
                .with(MockElement::field("et_email"))
                .with(MockElement::field("et_password"))
                .with(MockElement::button("loginBtn").with_text("Sign in")),
        )
        .screen(
            "home",
            MockScreen::new(".HomeActivity").with(MockElement::label("Welcome")),
        )
        .on_tap("login", "loginBtn", TapEffect::Navigate("home".into()))
}

/// Straight chain of `len` screens: s0 -> s1 -> ... each through a `next` button.
pub fn chain_app(len: usize) -> MockDriver {
    let mut driver = MockDriver::new(PACKAGE, "s0");
    for i in 0..len {
        let name = format!("s{}", i);
        let mut screen = MockScreen::new(&format!(".Step{}Activity", i))
            .with(MockElement::label(&format!("Step {}", i)));
        if i + 1 < len {
            screen = screen.with(MockElement::button("next"));
            driver = driver.on_tap(&name, "next", TapEffect::Navigate(format!("s{}", i + 1)));
        }
        driver = driver.screen(&name, screen);
    }
    driver
}

/// A button that kills the process; the launcher takes over until relaunch.
pub fn dying_app() -> MockDriver {
    MockDriver::new(PACKAGE, "main")
        .screen(
            "main",
            MockScreen::new(".MainActivity")
                .with(MockElement::label("Products"))
                .with(MockElement::button("killBtn"))
                .with(MockElement::button("otherBtn")),
        )
        .on_tap("main", "killBtn", TapEffect::Kill)
}

/// Home -> Basket -> Done, where checkout finishes the basket screen, so
/// back from Done lands on Home instead. With `replayable` false the entry
/// button only works once, like a one-time onboarding link.
pub fn checkout_app(replayable: bool) -> MockDriver {
    let driver = MockDriver::new(PACKAGE, "main")
        .screen(
            "main",
            MockScreen::new(".MainActivity")
                .with(MockElement::label("Home"))
                .with(MockElement::button("toBasket")),
        )
        .screen(
            "basket",
            MockScreen::new(".BasketActivity")
                .with(MockElement::label("Basket"))
                .with(MockElement::button("checkoutBtn"))
                .with(MockElement::button("likeBtn")),
        )
        .screen(
            "done",
            MockScreen::new(".DoneActivity").with(MockElement::label("Done")),
        )
        .on_tap("basket", "checkoutBtn", TapEffect::Replace("done".into()));

    let to_basket = TapEffect::Navigate("basket".into());
    if replayable {
        driver.on_tap("main", "toBasket", to_basket)
    } else {
        driver.on_tap_once("main", "toBasket", to_basket)
    }
}

/// `menu_app` whose sorted screen has a filter that finishes it, so getting
/// back to Sorted means replaying the menu item through its trigger.
pub fn filtered_menu_app() -> MockDriver {
    menu_app()
        .screen(
            "sorted",
            MockScreen::new(".SortedActivity")
                .with(MockElement::label("Sorted"))
                .with(MockElement::button("filterBtn"))
                .with(MockElement::button("likeBtn")),
        )
        .screen(
            "filtered",
            MockScreen::new(".FilteredActivity").with(MockElement::label("Filtered")),
        )
        .on_tap("sorted", "filterBtn", TapEffect::Replace("filtered".into()))
}
