pub mod modules {
    pub mod fields {
        pub mod core {
            pub mod alphabet;
        }
        pub mod use_cases {
            pub mod stream_alphabet {
                pub mod inbound {
                    pub mod graphql;
                }
            }
            pub mod fast_field {
                pub mod handler;
                pub mod inbound {
                    pub mod graphql;
                }
            }
            pub mod slow_field {
                pub mod handler;
                pub mod inbound {
                    pub mod graphql;
                }
            }
        }
    }

    pub mod incremental {
        pub mod core {
            pub mod document;
            pub mod payload;
            pub mod plan;
        }
        pub mod use_cases {
            pub mod execute_incremental {
                pub mod handler;
            }
        }
        pub mod adapters {
            pub mod inbound {
                pub mod accept;
            }
            pub mod outbound {
                pub mod event_stream;
                pub mod multipart;
                pub mod validation_gate;
            }
        }
    }

    pub mod consumer {
        pub mod core {
            pub mod chunk;
            pub mod result;
        }
        pub mod adapters {
            pub mod outbound {
                pub mod http_client;
            }
        }
    }
}

pub mod shell;
