//! Storefront command line.
//!
//! Usage:
//!     storefront products --page 2 --search phone
//!     storefront products --sort price-asc --max-price 50
//!     storefront deals
//!     storefront cart add 42
//!     storefront checkout --name "Ana" --address "1 Main St" --city Laval --postal-code "H7N 1A1"

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use storefront_catalog::{CatalogConfig, CatalogService, ListOptions, Notice, SortOrder};
use storefront_checkout::{submit, CheckoutForm};
use storefront_client::{ClientConfig, HttpCatalogClient};
use storefront_model::{average_rating, Order, PaymentMethod, Product, Province, Review};
use storefront_session::{CartStore, ReviewDraft, ReviewStore};
use storefront_storage::{FileStore, KeyValueStore, MemoryStore, Persistence};

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Browse the catalog, manage the cart and check out")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Catalog API root
    #[arg(long, global = true, env = "STOREFRONT_API_URL", default_value = "https://dummyjson.com")]
    api_url: String,

    /// Directory for cart, reviews, last order and catalog snapshot
    #[arg(long, global = true, env = "STOREFRONT_DATA_DIR", default_value = ".storefront")]
    data_dir: PathBuf,

    /// Keep state in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Per-attempt request timeout
    #[arg(long, global = true, default_value = "8000")]
    timeout_ms: u64,

    /// Retries after the first attempt
    #[arg(long, global = true, default_value = "2")]
    retries: u32,

    /// Default catalog page size
    #[arg(long, global = true, default_value = "20")]
    page_size: u32,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List one catalog page
    Products {
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Page size (defaults to --page-size)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Filter the page by title, brand or category
        #[arg(short, long)]
        search: Option<String>,

        /// Filter the page by category slug
        #[arg(short, long)]
        category: Option<String>,

        /// Lowest discounted price to show
        #[arg(long)]
        min_price: Option<f64>,

        /// Highest discounted price to show
        #[arg(long)]
        max_price: Option<f64>,

        /// none, price-asc, price-desc or rating-desc
        #[arg(long, default_value = "none")]
        sort: SortOrder,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Discounted products on the first page, largest discount first
    Deals {
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show one product with its reviews
    Product {
        id: String,

        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List categories
    Categories,

    /// Search the remote catalog
    Search {
        query: String,

        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(short, long)]
        limit: Option<u32>,

        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },

    /// Read or write reviews
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },

    /// Place an order for the cart
    Checkout {
        #[arg(long)]
        name: String,

        #[arg(long)]
        address: String,

        #[arg(long)]
        city: String,

        /// Quebec, Ontario, Alberta, British Columbia or Other
        #[arg(long, default_value = "Quebec")]
        province: String,

        #[arg(long)]
        postal_code: String,

        /// credit, paypal or bank
        #[arg(long, default_value = "credit")]
        payment: String,
    },

    /// Show the last placed order
    Order,
}

#[derive(Subcommand)]
enum CartAction {
    Show {
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    Add {
        id: String,
    },
    Remove {
        id: String,
    },
    /// Set a quantity; zero or less removes the line
    Set {
        id: String,
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    Clear,
}

#[derive(Subcommand)]
enum ReviewAction {
    Add {
        product_id: String,

        #[arg(short, long)]
        rating: Option<i64>,

        #[arg(short, long)]
        text: String,

        #[arg(short, long, default_value = "")]
        name: String,
    },
    List {
        product_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose { "storefront=debug" } else { "storefront=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    if cli.ephemeral {
        run(cli, Persistence::new(MemoryStore::new())).await
    } else {
        let store = FileStore::open(&cli.data_dir)?;
        tracing::debug!(dir = %store.dir().display(), "Using local data directory");
        run(cli, Persistence::new(store)).await
    }
}

async fn run<S: KeyValueStore>(cli: Cli, persistence: Persistence<S>) -> Result<()> {
    let client = HttpCatalogClient::new(ClientConfig {
        base_url: cli.api_url,
        timeout_ms: cli.timeout_ms,
        max_retries: cli.retries,
        ..Default::default()
    })?;
    let catalog = CatalogService::new(
        Arc::new(client),
        persistence.clone(),
        CatalogConfig {
            page_size: cli.page_size,
        },
    );

    match cli.command {
        Commands::Products {
            page,
            limit,
            search,
            category,
            min_price,
            max_price,
            sort,
            format,
        } => {
            let options = ListOptions {
                search: search.unwrap_or_default(),
                category,
                min_price,
                max_price,
                sort,
            };
            run_products(&catalog, page, limit, &options, &format).await?;
        }
        Commands::Deals { format } => {
            run_deals(&catalog, &format).await?;
        }
        Commands::Product { id, format } => {
            let reviews = ReviewStore::open(persistence);
            run_product(&catalog, &reviews, &id, &format).await?;
        }
        Commands::Categories => {
            let categories = catalog.load_categories().await;
            print_notice(catalog.notice())?;
            for category in categories {
                println!("{:<28} {}", category.id, category.label);
            }
        }
        Commands::Search {
            query,
            page,
            limit,
            format,
        } => {
            let results = catalog.search(&query, page, limit.unwrap_or(0)).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&results.items)?);
            } else {
                println!("Results for: {}", query);
                println!("---");
                print_products(&results.items);
                println!("\n---");
                println!("Total: {} matches", results.total);
            }
        }
        Commands::Cart { action } => {
            let mut cart = CartStore::open(persistence);
            run_cart(&catalog, &mut cart, action).await?;
        }
        Commands::Review { action } => {
            let mut reviews = ReviewStore::open(persistence);
            run_review(&catalog, &mut reviews, action).await?;
        }
        Commands::Checkout {
            name,
            address,
            city,
            province,
            postal_code,
            payment,
        } => {
            let form = CheckoutForm {
                name,
                address,
                city,
                province: Province::from(province.as_str()),
                postal_code,
                payment_method: parse_payment(&payment)?,
            };
            let mut cart = CartStore::open(persistence.clone());
            let order = submit(&mut cart, &persistence, &form)?;
            println!("Thank you! Order #{} placed.", order.id);
            print_order(&order);
        }
        Commands::Order => match persistence.load_last_order() {
            Some(order) => print_order(&order),
            None => println!("No order placed yet."),
        },
    }

    Ok(())
}

async fn run_products<S: KeyValueStore>(
    catalog: &CatalogService<HttpCatalogClient, S>,
    page: u32,
    limit: Option<u32>,
    options: &ListOptions,
    format: &str,
) -> Result<()> {
    catalog.open_page(page, limit.unwrap_or(0)).await;

    let view = catalog.view();
    let shown = catalog.browse(options);

    if format == "json" {
        let output = json!({
            "products": shown,
            "total": view.total,
            "page": view.current_page,
            "totalPages": view.total_pages(),
            "notice": view.notice,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_notice(view.notice.clone())?;
    print_products(&shown);
    println!("\n---");
    println!(
        "Page {} of {} ({} products)",
        view.current_page,
        view.total_pages().max(1),
        view.total
    );

    Ok(())
}

async fn run_deals<S: KeyValueStore>(catalog: &CatalogService<HttpCatalogClient, S>, format: &str) -> Result<()> {
    catalog.open_page(1, 0).await;
    let deals = catalog.deals();

    if format == "json" {
        let output = json!({ "deals": deals, "notice": catalog.notice() });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_notice(catalog.notice())?;
    if deals.is_empty() {
        println!("No deals right now.");
        return Ok(());
    }
    print_products(&deals);
    println!("\n---");
    println!("{} deals", deals.len());

    Ok(())
}

async fn run_product<S: KeyValueStore>(
    catalog: &CatalogService<HttpCatalogClient, S>,
    reviews: &ReviewStore<S>,
    id: &str,
    format: &str,
) -> Result<()> {
    let product = catalog.load_product_by_id(id).await?;
    let all_reviews = reviews.reviews_for_product(&product.id.key(), &product.reviews);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&json!({ "product": product, "reviews": all_reviews }))?);
        return Ok(());
    }

    println!("{} ({})", product.title, product.id);
    if !product.brand.is_empty() {
        println!("   Brand: {}", product.brand);
    }
    println!("   Category: {}", product.category);
    println!("   Price: {}", format_price(&product));
    println!("   Stock: {}", product.stock);
    if let Some(rating) = average_rating(&all_reviews, product.rating) {
        println!("   Rating: {:.1} ({} reviews)", rating, all_reviews.len());
    }
    if !product.description.is_empty() {
        println!("\n{}", product.description);
    }
    print_reviews(&all_reviews);

    Ok(())
}

async fn run_cart<S: KeyValueStore>(
    catalog: &CatalogService<HttpCatalogClient, S>,
    cart: &mut CartStore<S>,
    action: CartAction,
) -> Result<()> {
    match action {
        CartAction::Show { format } => {
            if format == "json" {
                let output = json!({
                    "items": cart.cart(),
                    "itemCount": cart.item_count(),
                    "subtotal": cart.subtotal(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }
        }
        CartAction::Add { id } => {
            let product = catalog.load_product_by_id(&id).await?;
            cart.add_to_cart(&product);
            println!("Added {} to cart.", product.title);
        }
        CartAction::Remove { id } => {
            cart.remove_from_cart(&id);
        }
        CartAction::Set { id, quantity } => {
            if cart.cart().get(&id).is_none() {
                bail!("No cart line for product {}", id);
            }
            cart.update_quantity(&id, quantity);
        }
        CartAction::Clear => {
            cart.clear_cart();
        }
    }

    if cart.items().is_empty() {
        println!("Your cart is empty.");
        return Ok(());
    }
    for item in cart.items() {
        println!(
            "{:>4} x {} ({}) @ {:.2} = {:.2}",
            item.quantity,
            item.title,
            item.id,
            cart.discounted_price(item),
            item.line_total()
        );
    }
    println!("---");
    println!("{} items, subtotal {:.2}", cart.item_count(), cart.subtotal());

    Ok(())
}

async fn run_review<S: KeyValueStore>(
    catalog: &CatalogService<HttpCatalogClient, S>,
    reviews: &mut ReviewStore<S>,
    action: ReviewAction,
) -> Result<()> {
    match action {
        ReviewAction::Add {
            product_id,
            rating,
            text,
            name,
        } => {
            let review = reviews.add_review(
                &product_id,
                ReviewDraft {
                    rating,
                    text,
                    reviewer_name: name,
                },
            )?;
            println!("Saved {}-star review by {}.", review.rating, review.reviewer_name);
        }
        ReviewAction::List { product_id } => {
            let (api_reviews, fallback) = match catalog.load_product_by_id(&product_id).await {
                Ok(product) => (product.reviews, product.rating),
                Err(e) => {
                    eprintln!("warning: {}", e);
                    (Vec::new(), 0.0)
                }
            };
            let all = reviews.reviews_for_product(&product_id, &api_reviews);
            match average_rating(&all, fallback) {
                Some(rating) => println!("Average rating: {:.1}", rating),
                None => println!("No ratings yet."),
            }
            print_reviews(&all);
        }
    }

    Ok(())
}

fn parse_payment(value: &str) -> Result<PaymentMethod> {
    Ok(match value.trim().to_lowercase().as_str() {
        "credit" => PaymentMethod::Credit,
        "paypal" => PaymentMethod::Paypal,
        "bank" => PaymentMethod::Bank,
        other => bail!("Unknown payment method: {}", other),
    })
}

/// Fatal notices abort the command, degraded ones are printed and ignored.
fn print_notice(notice: Option<Notice>) -> Result<()> {
    match notice {
        Some(Notice::Fatal(message)) => bail!(message),
        Some(Notice::Degraded(message)) => eprintln!("warning: {}", message),
        None => {}
    }
    Ok(())
}

fn format_price(product: &Product) -> String {
    if product.discount_percentage > 0.0 {
        format!(
            "{:.2} (was {:.2}, -{:.0}%)",
            product.effective_price(),
            product.price,
            product.discount_percentage
        )
    } else {
        format!("{:.2}", product.price)
    }
}

fn print_products(products: &[Product]) {
    for (i, product) in products.iter().enumerate() {
        println!("\n{}. {} (ID: {})", i + 1, product.title, product.id);
        if !product.brand.is_empty() {
            println!("   Brand: {}", product.brand);
        }
        println!("   Category: {} | Price: {}", product.category, format_price(product));
    }
}

fn print_reviews(reviews: &[Review]) {
    for review in reviews {
        println!("\n   {} stars by {} [{}]", review.rating, review.reviewer_name, review.source);
        println!("   {}", review.text);
    }
}

fn print_order(order: &Order) {
    for line in &order.items {
        println!("{:>4} x {} @ {:.2} = {:.2}", line.quantity, line.title, line.unit_price, line.line_total);
    }
    println!("---");
    println!(
        "Ship to: {}, {}, {}, {} {}",
        order.address.name, order.address.address, order.address.city, order.address.province, order.address.postal_code
    );
    println!("Payment: {}", order.payment_method);
    println!("Subtotal: {:.2}", order.totals.subtotal);
    println!("GST: {:.2}", order.totals.gst);
    if order.totals.qst > 0.0 {
        println!("QST: {:.2}", order.totals.qst);
    }
    println!("Total: {:.2}", order.totals.total);
}
