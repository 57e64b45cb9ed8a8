/// Declares an ASCOM device trait together with its HTTP routing glue.
///
/// Alongside the `async_trait` trait itself, this generates, in the invoking module:
/// - `Action`: one variant per method, carrying its decoded parameters;
/// - `Response`: one variant per method, carrying the successful return value;
/// - `Action::from_parts` to decode a request and `Action::handle` to run it against a device.
macro_rules! rpc_trait {
    (@extras Device) => {
        /// Static device name for the configured list.
        fn static_name(&self) -> &str;

        /// Unique ID of this device.
        fn unique_id(&self) -> &str;

        /// Device type as reported in the configured list (e.g. `Dome`).
        ///
        /// Routes use the lowercase form of this string.
        fn device_type(&self) -> &str;

        /// Device number as reported in the configured list.
        fn device_number(&self) -> usize;
    };

    // Don't add any extra code for other traits.
    (@extras $trait_name:ident) => {};

    (
        $(# $attr:tt)*
        $pub:vis trait $trait_name:ident: $first_parent:ident $(+ $trait_parents:ident)* {
            $(
                $(#[doc = $doc:literal])*
                #[http($method_path:literal, method = $http_method:ident)]
                $(# $method_attr:tt)*
                async fn $method_name:ident(
                    & $self:ident $(, #[http($param_query:literal $(, via = $param_via:path)?)] $param:ident: $param_ty:ty)* $(,)?
                ) -> $return_type:ty $default_body:block
            )*
        }
    ) => {
        #[expect(non_camel_case_types)]
        pub(crate) enum Action {
            $(
                $method_name {
                    $(
                        $param: $param_ty,
                    )*
                },
            )*
        }

        #[derive(serde::Serialize)]
        #[serde(untagged)]
        #[expect(non_camel_case_types)]
        pub(crate) enum Response {
            $(
                $method_name(<$return_type as $crate::errors::ASCOMResultOk>::Ok),
            )*
        }

        impl Action {
            pub(crate) fn from_parts(action: &str, params: &mut $crate::server::ActionParams) -> $crate::server::Result<Option<Self>> {
                Ok(Some(match (action, params) {
                    $(
                        ($method_path, $crate::server::ActionParams::$http_method(params)) => {
                            #[allow(unused)]
                            let mut params = params;
                            $(
                                let $param =
                                    params.extract($param_query)
                                    $(.map(<$param_via>::into))?
                                    ?;
                            )*

                            Self::$method_name { $($param),* }
                        }
                    )*
                    _ => return Ok(None),
                }))
            }

            pub(crate) async fn handle(self, device: &dyn $trait_name) -> $crate::ASCOMResult<Response> {
                match self {
                    $(
                        Self::$method_name { $($param),* } => {
                            device.$method_name($($param),*).await.map(Response::$method_name)
                        }
                    )*
                }
            }
        }

        $(# $attr)*
        #[async_trait::async_trait]
        #[allow(unused_variables)]
        $pub trait $trait_name: $first_parent $(+ $trait_parents)* {
            $(
                $(#[doc = $doc])*
                ///
                /// Definition before the `#[async_trait]` expansion:
                ///
                /// ```ignore
                #[doc = concat!("async fn ", stringify!($method_name), "(&self", $(", ", stringify!($param), ": ", stringify!($param_ty),)* ") -> ", stringify!($return_type))]
                /// # { unimplemented!() }
                /// ```
                $(# $method_attr)*
                async fn $method_name(
                    & $self $(, $param: $param_ty)*
                ) -> $return_type $default_body
            )*

            $crate::macros::rpc_trait!(@extras $trait_name);
        }
    };
}

pub(crate) use rpc_trait;
